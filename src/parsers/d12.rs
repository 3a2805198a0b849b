//! # `.d12` 输入文件读取
//!
//! `writers/d12.rs` 的逆过程：把主输入文件还原为
//! `(CrystalConfig, Vec<BasisSet>, AtomProps)`。
//!
//! 仅支持 `EXTERNAL` 几何。关键字参数个数由固定的关键字表决定，
//! 表中没有的关键字视为开关。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`, `commands/read_input.rs` 使用
//! - 使用 `models/config.rs`, `models/basis.rs`

use crate::error::{ScanError, ScanResult};
use crate::models::config::{
    AtomProps, CrystalConfig, DftConfig, ExchangeCorrelation, GeometryConfig, KeywordArg, KeywordBlock,
    OptimiseConfig, Scalar, ScfConfig,
};
use crate::models::{BasisSet, KPoints, ShrinkMesh};

/// 单个数值参数的关键字
const VALUE_KEYWORDS: &[&str] = &[
    "BIPOSIZE", "EXCHSIZE", "FINALRUN", "FMIXING", "ILASIZE", "MAXCYCLE", "MAXTRADIUS", "POLEORDR",
    "SMEAR", "TOLDEE", "TOLDEG", "TOLDEX", "TOLLDENS", "TOLLGRID", "TOLPSEUD",
];

/// 一行多个数值参数的关键字
const LIST_KEYWORDS: &[&str] = &["BETALOCK", "BROYDEN", "LEVSHIFT", "SPINLOCK", "TOLINTEG"];

const SINGLE_DETERMINANT: &[&str] = &["RHF", "UHF", "ROHF"];
const OPT_TYPES: &[&str] = &["ATOMONLY", "CELLONLY", "CVOLOPT", "FULLOPTG", "INTREDUN", "ITATOCEL"];
const HESSIANS: &[&str] = &["HESSIDEN", "HESSMOD1", "HESSMOD2", "HESSNUM", "HESSOPT"];
const GRADIENTS: &[&str] = &["NUMGRALL", "NUMGRATO", "NUMGRCEL"];
const GRIDS: &[&str] = &["OLDGRID", "LGRID", "XLGRID", "XXLGRID", "XXXLGRID", "HUGEGRID"];
const GRID_WEIGHTS: &[&str] = &["BECKE", "SAVIN"];
const GEOMETRY_PRINT: &[&str] = &["CIFPRT", "COORPRT", "EXTPRT", "PRINTCHG", "PRINTOUT", "SYMMOPS", "TESTGEOM"];
const POST_SCF: &[&str] = &["CMPLXFAC", "EXCHGENE", "GRADCAL", "POSTSCF", "PPAN", "SAVEWF"];

/// 逐行游标（跳过空行，保留原始行号）
struct Cursor<'a> {
    lines: Vec<(usize, &'a str)>,
    pos: usize,
    total: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        let lines: Vec<(usize, &str)> = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i, l.trim()))
            .filter(|(_, l)| !l.is_empty())
            .collect();
        Cursor {
            lines,
            pos: 0,
            total: text.lines().count(),
        }
    }

    fn next(&mut self, expected: &str) -> ScanResult<(usize, &'a str)> {
        let line = self
            .lines
            .get(self.pos)
            .copied()
            .ok_or_else(|| ScanError::eof(self.total, expected))?;
        self.pos += 1;
        Ok(line)
    }

    /// 读取整数列表，允许跨行，直到凑够 `count` 个
    fn integers(&mut self, count: usize, expected: &str) -> ScanResult<Vec<i64>> {
        let mut values = Vec::with_capacity(count);
        while values.len() < count {
            let (line, text) = self.next(expected)?;
            for token in text.split_whitespace() {
                let value = token.parse().map_err(|_| ScanError::Conversion {
                    line,
                    field: expected.to_string(),
                    token: token.to_string(),
                })?;
                values.push(value);
            }
        }
        if values.len() != count {
            return Err(ScanError::FieldCount {
                line: self.lines[self.pos - 1].0,
                expected: count,
                found: values.len(),
            });
        }
        Ok(values)
    }

    fn count(&mut self, expected: &str) -> ScanResult<usize> {
        let (line, text) = self.next(expected)?;
        text.parse().map_err(|_| ScanError::Conversion {
            line,
            field: expected.to_string(),
            token: text.to_string(),
        })
    }
}

fn parse_scalar(token: &str) -> Scalar {
    if let Ok(v) = token.parse::<i64>() {
        Scalar::Int(v)
    } else if let Ok(v) = token.parse::<f64>() {
        Scalar::Float(v)
    } else {
        Scalar::Text(token.to_string())
    }
}

/// 按关键字表读取参数
fn read_keyword(cursor: &mut Cursor, key: &str) -> ScanResult<KeywordArg> {
    if VALUE_KEYWORDS.contains(&key) {
        let (_, text) = cursor.next(key)?;
        Ok(KeywordArg::Value(parse_scalar(text)))
    } else if LIST_KEYWORDS.contains(&key) {
        let (_, text) = cursor.next(key)?;
        Ok(KeywordArg::List(text.split_whitespace().map(parse_scalar).collect()))
    } else {
        Ok(KeywordArg::Flag(true))
    }
}

fn to_indices(values: Vec<i64>, line: usize, what: &str) -> ScanResult<Vec<usize>> {
    values
        .into_iter()
        .map(|v| {
            usize::try_from(v).ok().filter(|i| *i > 0).ok_or_else(|| ScanError::Conversion {
                line,
                field: what.to_string(),
                token: v.to_string(),
            })
        })
        .collect()
}

fn read_optgeom(cursor: &mut Cursor, props: &mut AtomProps) -> ScanResult<OptimiseConfig> {
    let mut optimise = OptimiseConfig::default();
    loop {
        let (line, key) = cursor.next("ENDOPT")?;
        match key {
            "ENDOPT" => return Ok(optimise),
            "FRAGMENT" => {
                let count = cursor.count("FRAGMENT count")?;
                let indices = cursor.integers(count, "FRAGMENT atoms")?;
                props.unfixed.extend(to_indices(indices, line, "FRAGMENT atoms")?);
            }
            k if OPT_TYPES.contains(&k) => optimise.kind = Some(k.to_string()),
            k if HESSIANS.contains(&k) => optimise.hessian = Some(k.to_string()),
            k if GRADIENTS.contains(&k) => optimise.gradient = Some(k.to_string()),
            k if k.starts_with("PRINT") => optimise.info_print.push(k.to_string()),
            k => {
                let arg = read_keyword(cursor, k)?;
                optimise.convergence.insert(k.to_string(), arg);
            }
        }
    }
}

fn read_geometry(cursor: &mut Cursor, props: &mut AtomProps) -> ScanResult<GeometryConfig> {
    let (line, first) = cursor.next("EXTERNAL")?;
    if first != "EXTERNAL" {
        return Err(ScanError::unexpected(line, "EXTERNAL", first));
    }

    let mut geometry = GeometryConfig::default();
    loop {
        let (_, key) = cursor.next("END")?;
        match key {
            "END" => return Ok(geometry),
            "OPTGEOM" => geometry.optimise = Some(read_optgeom(cursor, props)?),
            k if GEOMETRY_PRINT.contains(&k) => geometry.info_print.push(k.to_string()),
            k => geometry.info_external.push(k.to_string()),
        }
    }
}

/// 读取单个基组（`header` 为已读出的 `Z NSHELL` 行）
fn read_basis_set(cursor: &mut Cursor, header: (usize, &str)) -> ScanResult<BasisSet> {
    let (line, text) = header;
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() != 2 {
        return Err(ScanError::FieldCount {
            line,
            expected: 2,
            found: tokens.len(),
        });
    }
    let parse = |token: &str, field: &str| -> ScanResult<i64> {
        token.parse().map_err(|_| ScanError::Conversion {
            line,
            field: field.to_string(),
            token: token.to_string(),
        })
    };
    let z = parse(tokens[0], "Z")?;
    let n_shells = parse(tokens[1], "NSHELL")?;

    let mut content = vec![text.to_string()];

    if z > 200 {
        let (ecp_line, ecp) = cursor.next("pseudopotential")?;
        content.push(ecp.to_string());
        if ecp == "INPUT" {
            // "ZNUC M M0 M1 M2 M3 M4"
            let (_, sizes) = cursor.next("ZNUC M M0 M1 M2 M3 M4")?;
            content.push(sizes.to_string());
            let counts: Vec<i64> = sizes.split_whitespace().skip(1).filter_map(|t| t.parse().ok()).collect();
            if counts.len() != 6 {
                return Err(ScanError::FieldCount {
                    line: ecp_line + 1,
                    expected: 7,
                    found: counts.len() + 1,
                });
            }
            for _ in 0..counts.iter().sum::<i64>() {
                let (_, term) = cursor.next("pseudopotential term")?;
                content.push(term.to_string());
            }
        }
    }

    for _ in 0..n_shells {
        // "ITYPE LAT NG CHE SCAL"
        let (shell_line, shell) = cursor.next("ITYPE LAT NG CHE SCAL")?;
        let fields: Vec<&str> = shell.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ScanError::FieldCount {
                line: shell_line,
                expected: 5,
                found: fields.len(),
            });
        }
        content.push(shell.to_string());

        let itype: i64 = fields[0].parse().map_err(|_| ScanError::Conversion {
            line: shell_line,
            field: "ITYPE".to_string(),
            token: fields[0].to_string(),
        })?;
        let n_primitives: usize = fields[2].parse().map_err(|_| ScanError::Conversion {
            line: shell_line,
            field: "NG".to_string(),
            token: fields[2].to_string(),
        })?;
        if itype == 0 {
            for _ in 0..n_primitives {
                let (_, primitive) = cursor.next("primitive exponent and coefficients")?;
                content.push(primitive.to_string());
            }
        }
    }

    Ok(BasisSet::new(content.join("\n")))
}

fn is_basis_terminator(text: &str) -> bool {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    tokens == ["99", "0"]
}

fn read_basis_block(
    cursor: &mut Cursor,
    props: &mut AtomProps,
) -> ScanResult<(Vec<BasisSet>, KeywordBlock)> {
    let mut basis_sets = Vec::new();
    loop {
        let header = cursor.next("99 0")?;
        if is_basis_terminator(header.1) {
            break;
        }
        basis_sets.push(read_basis_set(cursor, header)?);
    }

    let mut block = KeywordBlock::new();
    loop {
        let (line, key) = cursor.next("END")?;
        match key {
            "END" => return Ok((basis_sets, block)),
            "GHOSTS" => {
                let count = cursor.count("GHOSTS count")?;
                let indices = cursor.integers(count, "GHOSTS atoms")?;
                props.ghosts.extend(to_indices(indices, line, "GHOSTS atoms")?);
            }
            k => {
                let arg = read_keyword(cursor, k)?;
                block.insert(k.to_string(), arg);
            }
        }
    }
}

fn read_dft(cursor: &mut Cursor) -> ScanResult<DftConfig> {
    let mut functional: Option<String> = None;
    let mut correlation: Option<String> = None;
    let mut exchange: Option<String> = None;
    let mut spin = false;
    let mut grid = None;
    let mut grid_weights = None;
    let mut numerical = KeywordBlock::new();

    let end_line = loop {
        let (line, key) = cursor.next("END")?;
        match key {
            "END" => break line,
            "CORRELAT" => correlation = Some(cursor.next("correlation functional")?.1.to_string()),
            "EXCHANGE" => exchange = Some(cursor.next("exchange functional")?.1.to_string()),
            "SPIN" => spin = true,
            k if GRIDS.contains(&k) => grid = Some(k.to_string()),
            k if GRID_WEIGHTS.contains(&k) => grid_weights = Some(k.to_string()),
            k if VALUE_KEYWORDS.contains(&k) || LIST_KEYWORDS.contains(&k) => {
                let arg = read_keyword(cursor, k)?;
                numerical.insert(k.to_string(), arg);
            }
            k if functional.is_none() => functional = Some(k.to_string()),
            k => {
                numerical.insert(k.to_string(), KeywordArg::Flag(true));
            }
        }
    };

    let xc = match (functional, correlation, exchange) {
        (_, Some(c), Some(x)) => ExchangeCorrelation::Pair(c, x),
        (Some(f), None, None) => ExchangeCorrelation::Functional(f),
        _ => return Err(ScanError::unexpected(end_line, "functional or CORRELAT/EXCHANGE pair", "END")),
    };

    Ok(DftConfig {
        xc,
        spin,
        grid,
        grid_weights,
        numerical,
    })
}

fn read_shrink(cursor: &mut Cursor) -> ScanResult<KPoints> {
    let values = cursor.integers(2, "SHRINK IS ISP")?;
    let line = cursor.lines[cursor.pos - 1].0;
    let to_u32 = |v: i64, field: &str| -> ScanResult<u32> {
        u32::try_from(v).map_err(|_| ScanError::Conversion {
            line,
            field: field.to_string(),
            token: v.to_string(),
        })
    };
    let isp = to_u32(values[1], "ISP")?;
    if values[0] == 0 {
        let mesh = cursor.integers(3, "IS1 IS2 IS3")?;
        let line = cursor.lines[cursor.pos - 1].0;
        let mut vector = [0u32; 3];
        for (slot, v) in vector.iter_mut().zip(mesh) {
            *slot = u32::try_from(v).map_err(|_| ScanError::Conversion {
                line,
                field: "IS".to_string(),
                token: v.to_string(),
            })?;
        }
        Ok(KPoints(ShrinkMesh::Vector(vector), isp))
    } else {
        Ok(KPoints(ShrinkMesh::Uniform(to_u32(values[0], "IS")?), isp))
    }
}

fn read_atomspin(cursor: &mut Cursor, props: &mut AtomProps) -> ScanResult<()> {
    let count = cursor.count("ATOMSPIN count")?;
    let values = cursor.integers(2 * count, "ATOMSPIN index spin")?;
    let line = cursor.lines[cursor.pos - 1].0;
    for pair in values.chunks(2) {
        let index = to_indices(vec![pair[0]], line, "ATOMSPIN index")?[0];
        match pair[1] {
            1 => {
                props.spin_alpha.insert(index);
            }
            -1 => {
                props.spin_beta.insert(index);
            }
            0 => {}
            other => {
                return Err(ScanError::Conversion {
                    line,
                    field: "ATOMSPIN spin".to_string(),
                    token: other.to_string(),
                })
            }
        }
    }
    Ok(())
}

fn read_scf(cursor: &mut Cursor, props: &mut AtomProps) -> ScanResult<ScfConfig> {
    let mut single = None;
    let mut dft = None;
    let mut k_points = None;
    let mut guessp = false;
    let mut numerical = KeywordBlock::new();
    let mut post_scf = Vec::new();

    loop {
        let (_, key) = cursor.next("END")?;
        match key {
            "END" => break,
            "DFT" => dft = Some(read_dft(cursor)?),
            "SHRINK" => k_points = Some(read_shrink(cursor)?),
            "GUESSP" => guessp = true,
            "ATOMSPIN" => read_atomspin(cursor, props)?,
            k if SINGLE_DETERMINANT.contains(&k) => single = Some(k.to_string()),
            k if POST_SCF.contains(&k) => post_scf.push(k.to_string()),
            k => {
                let arg = read_keyword(cursor, k)?;
                numerical.insert(k.to_string(), arg);
            }
        }
    }

    let k_points = k_points.ok_or_else(|| ScanError::eof(cursor.total, "SHRINK"))?;
    Ok(ScfConfig {
        single,
        dft,
        k_points,
        guessp,
        numerical,
        post_scf,
    })
}

/// 读取 `.d12` 输入文本
pub fn read_input(text: &str) -> ScanResult<(CrystalConfig, Vec<BasisSet>, AtomProps)> {
    let mut cursor = Cursor::new(text);
    let mut props = AtomProps::default();

    let (_, title) = cursor.next("title")?;
    let geometry = read_geometry(&mut cursor, &mut props)?;
    let (basis_sets, basis_set) = read_basis_block(&mut cursor, &mut props)?;
    let scf = read_scf(&mut cursor, &mut props)?;

    let config = CrystalConfig {
        title: Some(title.to_string()),
        geometry,
        basis_set,
        scf,
    };
    Ok((config, basis_sets, props))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writers::d12::write_input;

    const MGO: &str = include_str!("../../testdata/mgo.d12");

    #[test]
    fn test_read_fixture() {
        let (config, basis_sets, props) = read_input(MGO).unwrap();

        assert_eq!(config.title.as_deref(), Some("MgO bulk PBE"));
        assert_eq!(basis_sets.len(), 2);
        assert_eq!(basis_sets[0].atomic_number(), Some(12));
        assert_eq!(basis_sets[1].atomic_number(), Some(8));
        assert_eq!(config.scf.k_points, KPoints(ShrinkMesh::Uniform(8), 8));

        let dft = config.scf.dft.as_ref().unwrap();
        assert_eq!(dft.xc, ExchangeCorrelation::Pair("PBE".to_string(), "PBE".to_string()));
        assert_eq!(dft.grid.as_deref(), Some("XLGRID"));

        assert_eq!(
            config.scf.numerical.get("TOLINTEG"),
            Some(&KeywordArg::List(vec![
                Scalar::Int(7),
                Scalar::Int(7),
                Scalar::Int(7),
                Scalar::Int(7),
                Scalar::Int(14)
            ]))
        );
        assert_eq!(
            config.scf.numerical.get("FMIXING"),
            Some(&KeywordArg::Value(Scalar::Int(30)))
        );
        assert_eq!(config.scf.numerical.get("NOBIPOLA"), Some(&KeywordArg::Flag(true)));
        assert_eq!(config.scf.post_scf, vec!["PPAN".to_string()]);

        let optimise = config.geometry.optimise.as_ref().unwrap();
        assert_eq!(optimise.kind.as_deref(), Some("FULLOPTG"));
        assert_eq!(
            optimise.convergence.get("TOLDEG"),
            Some(&KeywordArg::Value(Scalar::Float(0.0003)))
        );
        assert!(props.spin_alpha.is_empty());
    }

    #[test]
    fn test_round_trip_preserves_basis_and_kpoints() {
        let (config, basis_sets, props) = read_input(MGO).unwrap();
        let written = write_input(&config, &basis_sets, &props).unwrap();
        let (again, basis_again, props_again) = read_input(&written).unwrap();

        assert_eq!(basis_again, basis_sets);
        assert_eq!(again.scf.k_points, config.scf.k_points);
        assert_eq!(again, config);
        assert_eq!(props_again, props);
    }

    #[test]
    fn test_round_trip_atom_props_and_vector_mesh() {
        let (mut config, basis_sets, _) = read_input(MGO).unwrap();
        config.scf.k_points = KPoints(ShrinkMesh::Vector([6, 6, 1]), 12);
        config
            .scf
            .numerical
            .insert("SPINLOCK".to_string(), KeywordArg::List(vec![Scalar::Int(0), Scalar::Int(30)]));
        let props = AtomProps {
            spin_alpha: [1].into_iter().collect(),
            spin_beta: [2].into_iter().collect(),
            unfixed: [2].into_iter().collect(),
            ghosts: [1].into_iter().collect(),
        };

        let written = write_input(&config, &basis_sets, &props).unwrap();
        let (again, _, props_again) = read_input(&written).unwrap();
        assert_eq!(again.scf.k_points, KPoints(ShrinkMesh::Vector([6, 6, 1]), 12));
        assert_eq!(props_again, props);
    }

    #[test]
    fn test_requires_external_geometry() {
        let text = "title\nCRYSTAL\n0 0 0\n225\n4.21\n";
        assert_eq!(
            read_input(text),
            Err(ScanError::unexpected(1, "EXTERNAL", "CRYSTAL"))
        );
    }

    #[test]
    fn test_short_shell_line() {
        let text = MGO.replacen("0 1 2 8.0 1.0", "0 1 2 8.0", 1);
        assert!(matches!(
            read_input(&text),
            Err(ScanError::FieldCount { expected: 5, found: 4, .. })
        ));
    }

    #[test]
    fn test_missing_shrink() {
        let text = MGO.replace("SHRINK\n8 8\n", "");
        assert!(matches!(read_input(&text), Err(ScanError::UnexpectedEof { .. })));
    }
}
