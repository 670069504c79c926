//! Reading trained parameter sets and feature matrices from NumPy files.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use ndarray::{Array2, ArrayD, IxDyn, OwnedRepr};
use ndarray_npy::{NpzReader, ReadNpyError};
use tracing::{debug, info};

use crate::config::ModelDims;
use crate::weights::ParameterSet;
use crate::{Float, Result, ScnError};

/// Raw mapping from parameter name to tensor, as stored on disk.
pub type ParameterBundle = HashMap<String, ArrayD<Float>>;

/// Reads every array in an `.npz` archive, widening float32 to float64.
pub fn read_npz<R: Read + Seek>(reader: R) -> Result<ParameterBundle> {
    let mut npz = NpzReader::new(reader)?;
    let mut bundle = ParameterBundle::new();
    for name in npz.names()? {
        let array = match npz.by_name::<OwnedRepr<f64>, IxDyn>(&name) {
            Ok(array) => array,
            Err(wide_err) => match npz.by_name::<OwnedRepr<f32>, IxDyn>(&name) {
                Ok(array) => array.mapv(f64::from),
                Err(_) => return Err(wide_err.into()),
            },
        };
        let key = name.strip_suffix(".npy").unwrap_or(&name).to_string();
        debug!(key = %key, shape = ?array.shape(), "read parameter");
        bundle.insert(key, array);
    }
    Ok(bundle)
}

pub fn load_npz<P: AsRef<Path>>(path: P) -> Result<ParameterBundle> {
    let file = File::open(path)?;
    read_npz(file)
}

/// Loads `{prefix}{member}.npz` for every member id.
pub fn load_ensemble(prefix: &str, members: &[usize]) -> Result<Vec<ParameterSet>> {
    info!(prefix, ?members, "loading learned params");
    let mut sets = Vec::with_capacity(members.len());
    for (index, member) in members.iter().enumerate() {
        let path = format!("{prefix}{member}.npz");
        let bundle = load_npz(&path)?;
        let set = ParameterSet::from_bundle(&bundle, index)?;
        info!(path = %path, dims = ?set.dims(), "loaded ensemble member");
        sets.push(set);
    }
    Ok(sets)
}

/// Reads a 2-D `.npy` matrix of features, one row per item.
pub fn load_matrix<P: AsRef<Path>>(path: P) -> Result<Array2<Float>> {
    let path = path.as_ref();
    match ndarray_npy::read_npy::<_, Array2<f64>>(path) {
        Ok(matrix) => Ok(matrix),
        Err(ReadNpyError::WrongDescriptor(_)) => {
            let narrow: Array2<f32> = ndarray_npy::read_npy(path)?;
            Ok(narrow.mapv(f64::from))
        }
        Err(e) => Err(e.into()),
    }
}

/// Checks that all members agree on their dimensions.
pub fn common_dims(sets: &[ParameterSet]) -> Result<ModelDims> {
    let first = sets
        .first()
        .ok_or_else(|| ScnError::Configuration("ensemble has no members".to_string()))?
        .dims();
    for (member, set) in sets.iter().enumerate().skip(1) {
        let dims = set.dims();
        if dims != first {
            return Err(ScnError::EnsembleMismatch {
                member,
                expected: format!("{first:?}"),
                actual: format!("{dims:?}"),
            });
        }
    }
    Ok(first)
}
