//!
//! Text parameter file
//!
//! ```text
//! # motifhmm parameters
//! Version 2
//! Groups 3
//! 0   special     start       0   0   0   0
//! 1   background  background  0   0   0   1
//! 2   motif       m1          0   0   0   2,3,4
//! Class   main    m1  0.5,0.5 0.6,0.03
//! Transition 5
//! 0   0.99    0.01    0   0
//! ...
//! Emission 5
//! 0   0   0   0
//! ...
//! ```
//!
//! Group lines hold the index, kind, name, left/right padding, number of
//! insertion states and the comma separated states. Version 1 files carry
//! group lines with index, kind, name and states only, and no class lines.
//! Values are tab separated and written with the shortest representation
//! that reads back to the same `f64`.
//!
use super::model::{check_group, ClassParams, Group, GroupKind, Model};
use crate::common::N_EMISSIONS;
use crate::error::{Error, Result};
use itertools::Itertools;
use ndarray::Array2;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

/// version written by `to_writer`
pub const FORMAT_VERSION: usize = 2;

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "# motifhmm parameters")?;
        writeln!(f, "Version {}", FORMAT_VERSION)?;
        writeln!(f, "Groups {}", self.groups.len())?;
        for (i, g) in self.groups.iter().enumerate() {
            writeln!(
                f,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                i,
                g.kind,
                g.name,
                g.pad_left,
                g.pad_right,
                g.n_insertions,
                g.states.iter().join(",")
            )?;
        }
        for ((contrast, motif), params) in self.class_params.iter() {
            writeln!(
                f,
                "Class\t{}\t{}\t{}\t{}",
                contrast,
                motif,
                params.class_prior.iter().join(","),
                params.motif_prior.iter().join(",")
            )?;
        }
        writeln!(f, "Transition {}", self.n_states())?;
        for row in self.transition.rows() {
            writeln!(f, "{}", row.iter().join("\t"))?;
        }
        writeln!(f, "Emission {}", self.n_states())?;
        for row in self.emission.rows() {
            writeln!(f, "{}", row.iter().join("\t"))?;
        }
        Ok(())
    }
}

fn syntax<T>(line: usize, message: String) -> Result<T> {
    Err(Error::Syntax { line, message })
}

fn parse_value<T: std::str::FromStr>(line: usize, token: &str) -> Result<T> {
    token
        .parse::<T>()
        .or_else(|_| syntax(line, format!("invalid value {:?}", token)))
}

fn parse_list<T: std::str::FromStr>(line: usize, token: &str) -> Result<Vec<T>> {
    token.split(',').map(|x| parse_value(line, x)).collect()
}

///
/// `<keyword> <n>` header line
///
fn parse_header(line: usize, text: &str, keyword: &str) -> Result<usize> {
    let mut tokens = text.split_whitespace();
    match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(k), Some(n), None) if k == keyword => parse_value(line, n),
        _ => syntax(line, format!("expected \"{} <n>\", found {:?}", keyword, text)),
    }
}

fn parse_group(line: usize, text: &str, version: usize, index: usize) -> Result<Group> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let n_fields = if version == 1 { 4 } else { 7 };
    if tokens.len() != n_fields {
        return syntax(
            line,
            format!("expected {} fields in group line, found {}", n_fields, tokens.len()),
        );
    }
    if parse_value::<usize>(line, tokens[0])? != index {
        return syntax(line, format!("expected group {}", index));
    }
    let kind: GroupKind = tokens[1]
        .parse()
        .or_else(|e: String| syntax(line, e))?;
    let (pad_left, pad_right, n_insertions) = if version == 1 {
        (0, 0, 0)
    } else {
        (
            parse_value(line, tokens[3])?,
            parse_value(line, tokens[4])?,
            parse_value(line, tokens[5])?,
        )
    };
    let group = Group {
        kind,
        name: tokens[2].to_string(),
        states: parse_list(line, tokens[n_fields - 1])?,
        pad_left,
        pad_right,
        n_insertions,
    };
    check_group(index, &group).or_else(|e| syntax(line, e))?;
    Ok(group)
}

///
/// Every state `< n` belongs to exactly one of the groups
///
fn check_states(groups: &[(usize, Group)], n: usize, transition_line: usize) -> Result<()> {
    let mut owned = vec![false; n];
    for (line, group) in groups.iter() {
        for &state in group.states.iter() {
            if state >= n {
                return syntax(*line, format!("state {} out of range of {} states", state, n));
            }
            if owned[state] {
                return syntax(*line, format!("state {} belongs to two groups", state));
            }
            owned[state] = true;
        }
    }
    match owned.iter().position(|&x| !x) {
        Some(state) => syntax(transition_line, format!("state {} belongs to no group", state)),
        None => Ok(()),
    }
}

fn parse_class(line: usize, text: &str) -> Result<((String, String), ClassParams)> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() != 5 {
        return syntax(line, format!("expected 5 fields in class line, found {}", tokens.len()));
    }
    let params = ClassParams {
        class_prior: parse_list(line, tokens[3])?,
        motif_prior: parse_list(line, tokens[4])?,
    };
    if params.class_prior.len() != params.motif_prior.len() {
        return syntax(line, "class and motif priors differ in length".to_string());
    }
    Ok(((tokens[1].to_string(), tokens[2].to_string()), params))
}

fn parse_row(line: usize, text: &str, n_cols: usize) -> Result<Vec<f64>> {
    let row: Vec<f64> = text
        .split_whitespace()
        .map(|x| parse_value(line, x))
        .collect::<Result<_>>()?;
    if row.len() != n_cols {
        return syntax(line, format!("expected {} values, found {}", n_cols, row.len()));
    }
    Ok(row)
}

impl Model {
    ///
    /// Write the parameter file
    ///
    pub fn to_writer<W: std::io::Write>(&self, mut writer: W) -> std::io::Result<()> {
        write!(writer, "{}", self)
    }
    ///
    /// create file with `to_writer`
    ///
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        self.to_writer(&mut writer)?;
        std::io::Write::flush(&mut writer)?;
        Ok(())
    }
    ///
    /// Parse a parameter file of version 1 or 2
    ///
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        // meaningful lines with their 1-based line numbers
        let mut lines = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let text = line?;
            let trimmed = text.trim();
            if !trimmed.is_empty() && !trimmed.starts_with('#') {
                lines.push((i + 1, trimmed.to_string()));
            }
        }
        let mut lines = lines.into_iter();
        let mut last_line = 0;
        let mut next = |what: &str| -> Result<(usize, String)> {
            match lines.next() {
                Some((line, text)) => {
                    last_line = line;
                    Ok((line, text))
                }
                None => syntax(last_line + 1, format!("unexpected end of file, expected {}", what)),
            }
        };

        let (line, text) = next("version")?;
        let version = parse_header(line, &text, "Version")?;
        if version != 1 && version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let (line, text) = next("groups")?;
        let n_groups = parse_header(line, &text, "Groups")?;
        let mut groups = Vec::with_capacity(n_groups);
        for index in 0..n_groups {
            let (line, text) = next("group")?;
            groups.push((line, parse_group(line, &text, version, index)?));
        }

        let mut class_params = BTreeMap::new();
        let (mut line, mut text) = next("transitions")?;
        while version > 1 && text.starts_with("Class") {
            let (key, params) = parse_class(line, &text)?;
            class_params.insert(key, params);
            let (l, t) = next("transitions")?;
            line = l;
            text = t;
        }

        let n = parse_header(line, &text, "Transition")?;
        check_states(&groups, n, line)?;
        let mut transition = Array2::zeros((n, n));
        for i in 0..n {
            let (line, text) = next("transition row")?;
            for (j, x) in parse_row(line, &text, n)?.into_iter().enumerate() {
                transition[[i, j]] = x;
            }
        }

        let (line, text) = next("emissions")?;
        let m = parse_header(line, &text, "Emission")?;
        if m != n {
            return syntax(line, format!("expected {} emission rows, found {}", n, m));
        }
        let mut emission = Array2::zeros((n, N_EMISSIONS));
        for i in 0..n {
            let (line, text) = next("emission row")?;
            for (k, x) in parse_row(line, &text, N_EMISSIONS)?.into_iter().enumerate() {
                emission[[i, k]] = x;
            }
        }

        let groups = groups.into_iter().map(|(_, group)| group).collect();
        Model::from_parts(groups, transition, emission, class_params)
    }
    pub fn from_str(s: &str) -> Result<Self> {
        Self::from_reader(s.as_bytes())
    }
    ///
    /// Parse a parameter file, with path-specific errors
    ///
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ParameterFileMissing(path.to_path_buf()));
        }
        let file = std::fs::File::open(path).map_err(|source| Error::ParameterFileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(std::io::BufReader::new(file)).map_err(|e| match e {
            Error::Io(source) => Error::ParameterFileRead {
                path: path.to_path_buf(),
                source,
            },
            e => e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::model::tests::mock_model;
    use crate::hmm::model::MotifLayout;
    use crate::matrix::l1_diff;

    fn rich_model() -> Model {
        let mut model = mock_model();
        let layout = MotifLayout {
            insertions: vec![2],
            self_transition: true,
            pad_left: 1,
            pad_right: 0,
        };
        model
            .add_motif_iupac("CCGRA", 0.1, 37.0, 0.7, "m2", &layout)
            .unwrap();
        model.set_class_params(
            "main",
            "m1",
            ClassParams {
                class_prior: vec![0.3, 0.7],
                motif_prior: vec![0.6, 0.03],
            },
        );
        model
    }

    #[test]
    fn round_trip() {
        let model = rich_model();
        let s = model.to_string();
        let loaded = Model::from_str(&s).unwrap();
        assert_eq!(loaded.groups(), model.groups());
        assert_eq!(loaded.transition(), model.transition());
        assert_eq!(loaded.emission(), model.emission());
        assert_eq!(loaded.all_class_params(), model.all_class_params());
        assert_eq!(loaded.to_string(), s);
    }

    #[test]
    fn file_round_trip() {
        let model = rich_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.hmm");
        model.to_file(&path).unwrap();
        let loaded = Model::from_file(&path).unwrap();
        assert!(l1_diff(loaded.transition(), model.transition()) == 0.0);
        assert!(loaded.check_consistency(1e-9));
        assert!(matches!(
            Model::from_file(dir.path().join("missing.hmm")),
            Err(Error::ParameterFileMissing(_))
        ));
    }

    #[test]
    fn version_1() {
        let s = "Version 1\nGroups 2\n0 special start 0\n1 background background 1\n\
                 Transition 2\n0 1\n0 1\nEmission 2\n0 0 0 0\n0.25 0.25 0.25 0.25\n";
        let model = Model::from_str(s).unwrap();
        assert_eq!(model.n_states(), 2);
        assert_eq!(model.group(1).kind, GroupKind::Background);
        assert!(model.check_consistency(1e-9));
    }

    #[test]
    fn unsupported_version() {
        let s = "Version 7\nGroups 0\n";
        assert!(matches!(
            Model::from_str(s),
            Err(Error::UnsupportedVersion(7))
        ));
    }

    ///
    /// replace line `i` (0-based) of `s`
    ///
    fn with_line(s: &str, i: usize, replacement: &str) -> String {
        s.lines()
            .enumerate()
            .map(|(k, l)| if k == i { format!("{}\n", replacement) } else { format!("{}\n", l) })
            .collect()
    }

    fn syntax_line(s: &str) -> usize {
        match Model::from_str(s) {
            Err(Error::Syntax { line, .. }) => line,
            r => panic!("unexpected {:?}", r.map(|m| m.n_states())),
        }
    }

    #[test]
    fn malformed_groups() {
        // line 4 is the start group, line 5 the background, line 6 the motif
        let s = mock_model().to_string();
        // swapped start and background
        assert_eq!(syntax_line(&with_line(&s, 3, "0\tbackground\tstart\t0\t0\t0\t0")), 4);
        // start group owning a motif state
        assert_eq!(syntax_line(&with_line(&s, 3, "0\tspecial\tstart\t0\t0\t0\t0,2")), 4);
        // motif with insertion states only
        assert_eq!(
            syntax_line(&with_line(&s, 5, "2\tmotif\tm1\t0\t0\t6\t2,3,4,5,6,7")),
            6
        );
        // padding without core
        assert_eq!(
            syntax_line(&with_line(&s, 5, "2\tmotif\tm1\t4\t2\t0\t2,3,4,5,6,7")),
            6
        );
        // a name with a space splits into too many fields
        assert_eq!(
            syntax_line(&with_line(&s, 5, "2\tmotif\tm 1\t0\t0\t0\t2,3,4,5,6,7")),
            6
        );
        // state out of range and shared state
        assert_eq!(
            syntax_line(&with_line(&s, 5, "2\tmotif\tm1\t0\t0\t0\t2,3,4,5,6,8")),
            6
        );
        assert_eq!(
            syntax_line(&with_line(&s, 5, "2\tmotif\tm1\t0\t0\t0\t1,3,4,5,6,7")),
            6
        );
        // state 2 left without group, reported at the transition header
        assert_eq!(
            syntax_line(&with_line(&s, 5, "2\tmotif\tm1\t0\t0\t0\t3,4,5,6,7")),
            7
        );
    }

    #[test]
    fn written_names_read_back() {
        let mut model = Model::new();
        assert!(model
            .add_motif_iupac("ACGT", 0.03, 100.0, 1.0, "my motif", &MotifLayout::default())
            .is_err());
        model
            .add_motif_iupac("ACGT", 0.03, 100.0, 1.0, "my_motif", &MotifLayout::default())
            .unwrap();
        let loaded = Model::from_str(&model.to_string()).unwrap();
        assert_eq!(loaded.group(2).name, "my_motif");
    }

    #[test]
    fn syntax_errors() {
        let model = mock_model();
        let s = model.to_string();
        // break the first transition row (line 8)
        let broken: String = s
            .lines()
            .enumerate()
            .map(|(i, l)| if i == 7 { "0 x 1\n".to_string() } else { format!("{}\n", l) })
            .collect();
        match Model::from_str(&broken) {
            Err(Error::Syntax { line, .. }) => assert_eq!(line, 8),
            r => panic!("unexpected {:?}", r.map(|m| m.n_states())),
        }
        let truncated: String = s.lines().take(10).map(|l| format!("{}\n", l)).collect();
        assert!(matches!(
            Model::from_str(&truncated),
            Err(Error::Syntax { .. })
        ));
    }
}
