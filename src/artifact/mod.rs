/*!
Trained model artifacts: the LSTM weights and, next to them, a record of the scaler they were trained with

The scaler record carries a SHA-256 fingerprint of the weights file. Loading refuses a pair whose fingerprint does
not match, since a model fed through another model's scaler predicts meaningless prices.
*/
use crate::data::scale::MinMaxScaler;
use crate::data::window::WindowBuilder;
use crate::lstm::{LstmPredictor, StockLSTMDesc};
use crate::session::ModelContext;
use crate::util::fingerprint_file;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tch::Device;
use tracing::info;

/// The default file name of the model weights
pub const MODEL_FILE: &str = "stock_model.ot";

/// The default file name of the scaler record
pub const SCALER_FILE: &str = "scaler.csv";

/// Where a model's two artifacts live
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ArtifactPaths {
    /// The LSTM weights
    pub model: PathBuf,
    /// The scaler record
    pub scaler: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> ArtifactPaths {
        ArtifactPaths {
            model: PathBuf::from(MODEL_FILE),
            scaler: PathBuf::from(SCALER_FILE),
        }
    }
}

impl ArtifactPaths {
    /// The default file names inside `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> ArtifactPaths {
        ArtifactPaths {
            model: dir.as_ref().join(MODEL_FILE),
            scaler: dir.as_ref().join(SCALER_FILE),
        }
    }
}

/// Everything needed, besides the weights themselves, to run a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerRecord {
    /// The ticker the model was trained on
    pub ticker: String,
    /// The fitted scaler minimum
    pub min: f64,
    /// The fitted scaler maximum
    pub max: f64,
    /// The window size the model was trained with
    pub window: usize,
    /// The LSTM hidden size
    pub hidden: usize,
    /// The number of LSTM layers
    pub layers: usize,
    /// The dense layer width
    pub dense: usize,
    /// SHA-256 of the weights file written alongside this record
    pub model_sha256: String,
}

impl ScalerRecord {
    /// The scaler described by this record
    pub fn scaler(&self) -> MinMaxScaler {
        MinMaxScaler {
            min: self.min,
            max: self.max,
        }
    }

    /// The model shape described by this record
    pub fn desc(&self) -> StockLSTMDesc {
        StockLSTMDesc {
            hidden: self.hidden,
            layers: self.layers,
            dense: self.dense,
        }
    }
}

/// Write a scaler record
pub fn write_record(path: &Path, record: &ScalerRecord) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path).map_err(|err| Error::artifact(path, err))?;
    wtr.serialize(record).map_err(|err| Error::artifact(path, err))?;
    wtr.flush().map_err(|err| Error::artifact(path, err))?;
    Ok(())
}

/// Read a scaler record, which must hold exactly one row
pub fn read_record(path: &Path) -> Result<ScalerRecord> {
    let file = File::open(path).map_err(|err| Error::artifact(path, err))?;
    let mut records = csv::Reader::from_reader(file).into_deserialize::<ScalerRecord>();
    let record = match records.next() {
        Some(record) => record.map_err(|err| Error::artifact(path, err))?,
        None => return Err(Error::artifact(path, "no scaler record")),
    };
    if records.next().is_some() {
        return Err(Error::artifact(path, "more than one scaler record"));
    }
    record
        .scaler()
        .range()
        .map_err(|err| Error::artifact(path, err))?;
    Ok(record)
}

/// Check that the weights file at `model` is the one `record` was written with
pub fn verify(model: &Path, record: &ScalerRecord) -> Result<()> {
    let fingerprint = fingerprint_file(model).map_err(|err| Error::artifact(model, err))?;
    if fingerprint != record.model_sha256 {
        return Err(Error::artifact(
            model,
            format!(
                "weights do not match the scaler record for {} (fingerprint {}, expected {})",
                record.ticker, fingerprint, record.model_sha256
            ),
        ));
    }
    Ok(())
}

/// Write a trained model and the scaler it was trained with
pub fn save(
    paths: &ArtifactPaths,
    ticker: &str,
    predictor: &LstmPredictor,
    scaler: &MinMaxScaler,
    window: WindowBuilder,
) -> Result<ScalerRecord> {
    predictor
        .save(&paths.model)
        .map_err(|err| Error::artifact(&paths.model, err))?;
    let model_sha256 =
        fingerprint_file(&paths.model).map_err(|err| Error::artifact(&paths.model, err))?;
    let record = ScalerRecord {
        ticker: ticker.to_string(),
        min: scaler.min,
        max: scaler.max,
        window: window.size,
        hidden: predictor.desc.hidden,
        layers: predictor.desc.layers,
        dense: predictor.desc.dense,
        model_sha256,
    };
    write_record(&paths.scaler, &record)?;
    info!(
        "Saved model to {} and scaler to {}",
        paths.model.display(),
        paths.scaler.display()
    );
    Ok(record)
}

/// Load a model and its scaler, refusing mismatched pairs
pub fn load(paths: &ArtifactPaths, device: Device) -> Result<ModelContext<LstmPredictor>> {
    let record = read_record(&paths.scaler)?;
    verify(&paths.model, &record)?;
    let predictor = LstmPredictor::load(&record.desc(), &paths.model, device)
        .map_err(|err| Error::artifact(&paths.model, err))?;
    info!(
        "Loaded model for {} from {}",
        record.ticker,
        paths.model.display()
    );
    Ok(ModelContext {
        predictor,
        scaler: record.scaler(),
        window: WindowBuilder::new(record.window),
        ticker: record.ticker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn record(sha: &str) -> ScalerRecord {
        ScalerRecord {
            ticker: "AAPL".into(),
            min: 120.5,
            max: 198.25,
            window: 60,
            hidden: 50,
            layers: 2,
            dense: 25,
            model_sha256: sha.into(),
        }
    }

    #[test]
    fn records_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCALER_FILE);
        write_record(&path, &record("00")).unwrap();
        assert_eq!(read_record(&path).unwrap(), record("00"));
    }

    #[test]
    fn missing_artifacts_are_artifact_errors() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        assert!(matches!(
            load(&paths, Device::Cpu),
            Err(Error::Artifact { .. })
        ));
        write_record(&paths.scaler, &record("00")).unwrap();
        assert!(matches!(
            load(&paths, Device::Cpu),
            Err(Error::Artifact { .. })
        ));
    }

    #[test]
    fn mismatched_weights_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        fs::write(&paths.model, b"some other model").unwrap();
        write_record(&paths.scaler, &record("00")).unwrap();
        let err = verify(&paths.model, &read_record(&paths.scaler).unwrap()).unwrap_err();
        assert!(matches!(err, Error::Artifact { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn degenerate_scalers_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCALER_FILE);
        let mut constant = record("00");
        constant.max = constant.min;
        write_record(&path, &constant).unwrap();
        assert!(matches!(read_record(&path), Err(Error::Artifact { .. })));
    }
}
