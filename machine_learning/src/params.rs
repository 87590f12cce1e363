use std::{collections::HashMap, fs, path::Path};

use log::debug;
use tensor::Tensor;

use crate::{NnErr, Result};

type Header = u32;
const HEADER_SIZE: usize = size_of::<Header>();

/// Named, immutable network parameters.
///
/// The packed resource format is a little-endian `u32` metadata length, a JSON array of
/// `[name, shape]` entries, then the little-endian `f32` values of every entry, contiguous and
/// in metadata order.
#[derive(Clone, Default)]
pub struct ParamDict {
    order: Vec<String>,
    params: HashMap<String, Tensor>,
}

impl ParamDict {
    /// Creates an empty `ParamDict`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a packed parameter resource from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        debug!(bytes = bytes.len(); "read model resource {}", path.display());
        Self::from_bytes(&bytes)
    }

    /// Decodes a packed parameter resource.
    ///
    /// # Returns
    /// The parameters, or a `ResourceLoadFailure` if the buffer is truncated or carries more
    /// data than its metadata describes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(malformed(format!("{} bytes is too short for a header", bytes.len())));
        }

        let (header, rest) = bytes.split_at(HEADER_SIZE);
        let mut len_bytes = [0; HEADER_SIZE];
        len_bytes.copy_from_slice(header);
        let meta_len = Header::from_le_bytes(len_bytes) as usize;

        if rest.len() < meta_len {
            return Err(malformed(format!(
                "metadata of {meta_len} bytes does not fit in {} bytes",
                rest.len()
            )));
        }

        let (meta, data) = rest.split_at(meta_len);
        let entries: Vec<(String, Vec<usize>)> = serde_json::from_slice(meta)?;

        if data.len() % size_of::<f32>() != 0 {
            return Err(malformed(format!("{} data bytes are not whole f32 values", data.len())));
        }

        let values: Vec<f32> = bytemuck::pod_collect_to_vec::<u8, Header>(data)
            .into_iter()
            .map(|bits| f32::from_bits(Header::from_le(bits)))
            .collect();

        let numels = entries
            .iter()
            .map(|(name, dims)| {
                dims.iter()
                    .try_fold(1usize, |n, &d| n.checked_mul(d))
                    .ok_or_else(|| malformed(format!("{name} has an overflowing shape {dims:?}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let expected = numels
            .iter()
            .try_fold(0usize, |total, &n| total.checked_add(n))
            .ok_or_else(|| malformed("metadata describes more values than fit in memory".to_string()))?;
        if expected != values.len() {
            return Err(malformed(format!(
                "metadata describes {expected} values but the resource holds {}",
                values.len()
            )));
        }

        let mut dict = Self::new();
        let mut offset = 0;
        for ((name, dims), numel) in entries.into_iter().zip(numels) {
            let tensor = Tensor::from_vec(values[offset..offset + numel].to_vec(), &dims)?;
            offset += numel;
            dict.insert(name, tensor);
        }

        Ok(dict)
    }

    /// Encodes the parameters in the packed resource format, in insertion order.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let entries: Vec<(&str, &[usize])> = self
            .iter()
            .map(|(name, tensor)| (name, tensor.dims()))
            .collect();
        let meta = serde_json::to_vec(&entries)?;

        let meta_len = Header::try_from(meta.len())
            .map_err(|_| malformed(format!("metadata of {} bytes is too large", meta.len())))?;

        let mut buf = Vec::with_capacity(HEADER_SIZE + meta.len());
        buf.extend_from_slice(&meta_len.to_le_bytes());
        buf.extend_from_slice(&meta);
        for (_, tensor) in self.iter() {
            for value in tensor.values().iter() {
                buf.extend_from_slice(&value.to_le_bytes());
            }
        }

        Ok(buf)
    }

    /// Adds a parameter, replacing any previous one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        let name = name.into();
        if self.params.insert(name.clone(), tensor.detach()).is_none() {
            self.order.push(name);
        }
    }

    /// Returns the parameter called `name`.
    pub fn get(&self, name: &str) -> Result<&Tensor> {
        self.params.get(name).ok_or_else(|| NnErr::MissingParam {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates over the parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.order
            .iter()
            .filter_map(|name| Some((name.as_str(), self.params.get(name)?)))
    }

    /// Converts every matrix from the stored `[out, in]` layout to the `[in, out]` layout
    /// consumed by `x * W`.
    pub fn with_transposed_weights(mut self) -> Result<Self> {
        for tensor in self.params.values_mut() {
            if tensor.ndim() == 2 {
                *tensor = tensor.transpose()?;
            }
        }

        Ok(self)
    }
}

fn malformed(reason: String) -> NnErr {
    NnErr::ResourceLoadFailure { reason }
}
