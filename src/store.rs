//! Persistence: sampled models as JSON, probability matrices as TSV,
//! and the per-iteration trace as TSV.
use crate::alphabet::Label;
use crate::error::{Error, Result};
use crate::model::Model;
use crate::sampler::IterationRecord;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Write the sampled models into `path` as a JSON array.
pub fn save_samples<P: AsRef<Path>>(path: P, models: &[Model]) -> Result<()> {
    let mut wtr = BufWriter::new(std::fs::File::create(path)?);
    serde_json::to_writer(&mut wtr, models)?;
    wtr.flush()?;
    Ok(())
}

/// Read models written by [`save_samples`]. Every model is validated,
/// strong connectivity included.
pub fn load_samples<P: AsRef<Path>>(path: P) -> Result<Vec<Model>> {
    let rdr = BufReader::new(std::fs::File::open(path)?);
    let models: Vec<Model> = serde_json::from_reader(rdr)?;
    for model in models.iter() {
        crate::validate::validate_for_inference(model)?;
    }
    Ok(models)
}

/// Read a headerless tab separated matrix of probabilities.
pub fn read_matrix<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<f64>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)?;
    let mut matrix = vec![];
    for (i, record) in rdr.records().enumerate() {
        let row = record?
            .iter()
            .map(|x| {
                x.trim().parse::<f64>().map_err(|e| {
                    Error::Malformed(format!("row {}: {:?} is not a number ({})", i, x, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        matrix.push(row);
    }
    Ok(matrix)
}

/// Parse a label layout such as `A:15,O:12,B:9` into one label per state.
pub fn parse_layout(layout: &str) -> Result<Vec<Label>> {
    let mut labels = vec![];
    for block in layout.split(',').map(|b| b.trim()).filter(|b| !b.is_empty()) {
        let malformed = || Error::Malformed(format!("bad label block {:?}", block));
        let mut fields = block.splitn(2, ':');
        let label = match fields.next().map(|l| l.trim().as_bytes()) {
            Some(&[code]) => Label::from_dssp(code).ok_or_else(malformed)?,
            _ => return Err(malformed()),
        };
        let count: usize = fields
            .next()
            .and_then(|c| c.trim().parse().ok())
            .ok_or_else(malformed)?;
        labels.extend(std::iter::repeat(label).take(count));
    }
    Ok(labels)
}

/// Build a model from a transition matrix without the start row (`a`),
/// an emission matrix (`e`), and a label layout. The start row is uniform.
/// If `renormalize` is true, the rows of `a` and the columns of `e` are divided by their sums
/// first, which is needed for matrices rounded when they were written.
pub fn load_model<P: AsRef<Path>, Q: AsRef<Path>>(
    a: P,
    e: Q,
    layout: &str,
    renormalize: bool,
) -> Result<Model> {
    let mut transitions = read_matrix(a)?;
    let mut emissions = read_matrix(e)?;
    let labels = parse_layout(layout)?;
    let states = labels.len();
    if states == 0 {
        return Err(Error::Malformed("empty label layout".to_string()));
    }
    if renormalize {
        for row in transitions.iter_mut() {
            let sum: f64 = row.iter().sum();
            if 0f64 < sum {
                row.iter_mut().for_each(|x| *x /= sum);
            }
        }
        let columns = emissions.first().map(|r| r.len()).unwrap_or(0);
        for j in 0..columns {
            let sum: f64 = emissions.iter().filter_map(|r| r.get(j)).sum();
            if 0f64 < sum {
                emissions.iter_mut().filter_map(|r| r.get_mut(j)).for_each(|x| *x /= sum);
            }
        }
    }
    transitions.insert(0, vec![(states as f64).recip(); states]);
    let model = Model::new(transitions, emissions, labels)?;
    debug!("Loaded a model with {} states", model.states());
    Ok(model)
}

/// Writes [`IterationRecord`]s as TSV with the header `loglik move lik.ratio accept`.
pub struct TraceWriter<W: Write> {
    wtr: csv::Writer<W>,
}

impl<W: Write> TraceWriter<W> {
    pub fn new(wtr: W) -> Result<Self> {
        let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(wtr);
        wtr.write_record(&["loglik", "move", "lik.ratio", "accept"])?;
        Ok(Self { wtr })
    }
    pub fn write(&mut self, record: &IterationRecord) -> Result<()> {
        let accept = if record.accepted { "TRUE" } else { "FALSE" };
        self.wtr.write_record(&[
            record.log_likelihood.to_string(),
            record.mv.to_string(),
            record.ratio.to_string(),
            accept.to_string(),
        ])?;
        Ok(())
    }
    pub fn flush(&mut self) -> Result<()> {
        self.wtr.flush()?;
        Ok(())
    }
    pub fn into_inner(self) -> Result<W> {
        self.wtr.into_inner().map_err(|e| Error::Io(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::NUM_SYMBOLS;
    use crate::hmm::tests::three_state_model;
    use std::fs::File;
    use tempfile::tempdir;
    fn write_matrix(path: &Path, matrix: &[Vec<f64>]) {
        let mut file = File::create(path).unwrap();
        for row in matrix {
            let row: Vec<_> = row.iter().map(|x| x.to_string()).collect();
            writeln!(file, "{}", row.join("\t")).unwrap();
        }
    }
    #[test]
    fn samples_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models.json");
        let models = vec![three_state_model(), crate::moves::split_state(&three_state_model(), 1)];
        save_samples(&path, &models).unwrap();
        assert_eq!(load_samples(&path).unwrap(), models);
    }
    #[test]
    fn load_rejects_invalid_models() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models.json");
        let (mut trans, emit, labels) = three_state_model().into_raw_elements();
        trans[1][0] = 0.5;
        save_samples(&path, &[Model::from_raw_elements(trans, emit, labels)]).unwrap();
        match load_samples(&path) {
            Err(Error::InvalidModel(_)) => {}
            x => panic!("{:?}", x),
        }
        std::fs::write(&path, "[{").unwrap();
        assert!(matches!(load_samples(&path), Err(Error::Json(_))));
    }
    #[test]
    fn layout() {
        use Label::*;
        let labels = parse_layout("A:2, O:1,B:3").unwrap();
        assert_eq!(labels, vec![A, A, O, B, B, B]);
        assert_eq!(parse_layout("H:1").unwrap(), vec![A]);
        assert!(parse_layout("A2").is_err());
        assert!(parse_layout("Z:2").is_err());
        assert!(parse_layout("A:x").is_err());
    }
    #[test]
    fn model_from_matrices() {
        let dir = tempdir().unwrap();
        let (a_path, e_path) = (dir.path().join("a.tsv"), dir.path().join("e.tsv"));
        let model = three_state_model();
        write_matrix(&a_path, &model.transitions()[1..]);
        write_matrix(&e_path, model.emissions());
        let loaded = load_model(&a_path, &e_path, "A:1,B:1,O:1", false).unwrap();
        assert_eq!(loaded.labels(), model.labels());
        assert!(loaded.dist(&model).unwrap() < 1e-20);
        // Rounded matrices need renormalization.
        let rounded: Vec<Vec<f64>> = vec![vec![0.3334, 0.3334, 0.3334]; 3];
        write_matrix(&a_path, &rounded);
        assert!(load_model(&a_path, &e_path, "A:1,B:1,O:1", false).is_err());
        let loaded = load_model(&a_path, &e_path, "A:1,B:1,O:1", true).unwrap();
        assert!((loaded.transition(2, 3) - 1f64 / 3f64).abs() < 1e-12);
        // Shape mismatch with the layout.
        assert!(load_model(&a_path, &e_path, "A:2,B:1,O:1", true).is_err());
        assert_eq!(read_matrix(&e_path).unwrap().len(), NUM_SYMBOLS);
    }
    #[test]
    fn bad_matrix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.tsv");
        std::fs::write(&path, "0.5\tfoo\n").unwrap();
        assert!(matches!(read_matrix(&path), Err(Error::Malformed(_))));
    }
    #[test]
    fn trace() {
        use crate::moves::Move;
        let mut wtr = TraceWriter::new(vec![]).unwrap();
        let record = IterationRecord {
            iteration: 0,
            log_likelihood: -10.5,
            mv: Move::AddEdge,
            unchanged: false,
            ratio: 0.5,
            accepted: false,
            states: 3,
        };
        wtr.write(&record).unwrap();
        let output = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines, vec!["loglik\tmove\tlik.ratio\taccept", "-10.5\tadd.edge\t0.5\tFALSE"]);
    }
}
