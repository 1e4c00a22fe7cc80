use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use anyhow::{bail, Context, Result};
use ndarray::{Array2, ArrayD, Axis, Ix2, IxDyn};
use ndarray_npy::ReadNpyExt;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum TensorJson {
    Rows(Vec<Vec<f32>>),
    Batched(Vec<Vec<Vec<f32>>>),
    Flat { shape: Vec<usize>, data: Vec<f32> },
}

/// Reads a detection tensor from a `.npy` or `.json` file.
///
/// Accepts `(N, W)` or `(1, N, W)`; any other batch size is rejected.
pub fn read_tensor(path: impl AsRef<Path>) -> Result<Array2<f32>> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let tensor = match ext.as_str() {
        "npy" => {
            let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            ArrayD::<f32>::read_npy(BufReader::new(file))
                .with_context(|| format!("Failed to read npy tensor from {}", path.display()))?
        }
        "json" => {
            let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            let parsed: TensorJson = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse tensor JSON from {}", path.display()))?;
            json_to_array(parsed)?
        }
        other => bail!("Unsupported tensor file extension '{}' for {}", other, path.display()),
    };

    to_detection_matrix(tensor).with_context(|| format!("Unexpected tensor layout in {}", path.display()))
}

fn json_to_array(parsed: TensorJson) -> Result<ArrayD<f32>> {
    let (shape, data) = match parsed {
        TensorJson::Rows(rows) => {
            let width = rows.first().map(|r| r.len()).unwrap_or(0);
            if rows.iter().any(|r| r.len() != width) {
                bail!("Ragged tensor rows");
            }
            (vec![rows.len(), width], rows.into_iter().flatten().collect())
        }
        TensorJson::Batched(batches) => {
            let n = batches.first().map(|b| b.len()).unwrap_or(0);
            let width = batches.first().and_then(|b| b.first()).map(|r| r.len()).unwrap_or(0);
            if batches.iter().any(|b| b.len() != n || b.iter().any(|r| r.len() != width)) {
                bail!("Ragged tensor rows");
            }
            (vec![batches.len(), n, width], batches.into_iter().flatten().flatten().collect())
        }
        TensorJson::Flat { shape, data } => (shape, data),
    };
    ArrayD::from_shape_vec(IxDyn(&shape), data).context("Tensor data does not match its shape")
}

fn to_detection_matrix(tensor: ArrayD<f32>) -> Result<Array2<f32>> {
    let tensor = match tensor.ndim() {
        2 => tensor,
        3 if tensor.shape()[0] == 1 => tensor.index_axis_move(Axis(0), 0),
        3 => bail!("Batch size {} is not supported, expected 1", tensor.shape()[0]),
        n => bail!("Expected a 2-D or 3-D tensor, got {} dimensions", n),
    };
    Ok(tensor.into_dimensionality::<Ix2>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use ndarray::array;
    use ndarray_npy::WriteNpyExt;

    fn json_file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(f, "{}", contents).unwrap();
        f
    }

    #[test]
    fn reads_json_rows() {
        let f = json_file("[[1, 2, 3, 4, 0.5, 0.1, 0.2], [5, 6, 7, 8, 0.9, 0.3, 0.4]]");
        let t = read_tensor(f.path()).unwrap();
        assert_eq!(t.shape(), &[2, 7]);
        assert_eq!(t[[1, 4]], 0.9);
    }

    #[test]
    fn reads_json_batched_and_flat() {
        let f = json_file("[[[1, 2, 3, 4, 0.5, 0.1, 0.2]]]");
        assert_eq!(read_tensor(f.path()).unwrap().shape(), &[1, 7]);
        let f = json_file(r#"{"shape": [1, 2, 3], "data": [1, 2, 3, 4, 5, 6]}"#);
        let t = read_tensor(f.path()).unwrap();
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t[[1, 0]], 4.);
    }

    #[test]
    fn rejects_batches_and_ragged_rows() {
        let f = json_file(r#"{"shape": [2, 1, 3], "data": [1, 2, 3, 4, 5, 6]}"#);
        assert!(read_tensor(f.path()).is_err());
        let f = json_file("[[1, 2, 3], [4, 5]]");
        assert!(read_tensor(f.path()).is_err());
    }

    #[test]
    fn reads_npy_with_nan() {
        let f = tempfile::Builder::new().suffix(".npy").tempfile().unwrap();
        let a = array![[[1f32, 2., 3., 4., f32::NAN, 0.1, 0.2]]];
        a.write_npy(f.reopen().unwrap()).unwrap();
        let t = read_tensor(f.path()).unwrap();
        assert_eq!(t.shape(), &[1, 7]);
        assert!(t[[0, 4]].is_nan());
    }

    #[test]
    fn rejects_unknown_extension() {
        let f = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        assert!(read_tensor(f.path()).is_err());
    }
}
