//! Layer persistence: `LayerData` mirrors a `MeshLayer` as plain serde data.
//!
//! NaN entries (unset times, lazy constraint offsets) are written as JSON
//! `null` and read back as NaN. Loading allocates every sample first and then
//! checks that all topology references resolve.

use serde::{Deserialize, Serialize};

use super::layer::MeshLayer;
use super::types::{BorderSample, InnerSample, CHANNELS};
use crate::error::{Error, Result};
use crate::Vec2;

/// Serialized form of one layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerData {
    pub level: usize,
    pub index: usize,
    pub sketch_id: usize,
    pub eta: f64,
    pub min: Vec2<f64>,
    pub max: Vec2<f64>,
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub mirror_x: bool,
    #[serde(with = "nan_vec")]
    pub fgrid: Vec<f64>,
    #[serde(with = "nan_vec")]
    pub bdata: Vec<f64>,
    pub grid_samples: Vec<InnerSample>,
    pub border_samples: Vec<BorderSample>,
    pub seg_offsets: Vec<usize>,
    #[serde(default)]
    pub tref: Option<usize>,
    #[serde(default)]
    pub has_isoline: bool,
}

impl MeshLayer {
    pub fn to_data(&self) -> LayerData {
        LayerData {
            level: self.level,
            index: self.index,
            sketch_id: self.index,
            eta: self.eta,
            min: self.min,
            max: self.max,
            width: self.width,
            height: self.height,
            mirror_x: self.mirror_x,
            fgrid: self.fgrid.clone(),
            bdata: self.bdata.clone(),
            grid_samples: self.inner.clone(),
            border_samples: self.border.clone(),
            seg_offsets: self.seg_offsets.clone(),
            tref: self.tref,
            has_isoline: self.has_isoline,
        }
    }

    /// Rebuild a layer from its data.
    ///
    /// Errors with `Topology` when arrays have the wrong length or a sample
    /// refers to a missing sample of this layer.
    pub fn from_data(data: LayerData) -> Result<MeshLayer> {
        let mut layer = MeshLayer::empty(
            data.level,
            data.index,
            data.eta,
            data.min,
            data.max,
            data.mirror_x,
        );
        if layer.width != data.width || layer.height != data.height {
            return Err(Error::Topology(format!(
                "grid {}x{} does not match bounds and spacing ({}x{})",
                data.width, data.height, layer.width, layer.height
            )));
        }
        let n_inner = data.grid_samples.len();
        let n_border = data.border_samples.len();
        if data.fgrid.len() != data.width * data.height * CHANNELS {
            return Err(Error::Topology(format!(
                "fgrid holds {} floats, expected {}",
                data.fgrid.len(),
                data.width * data.height * CHANNELS
            )));
        }
        if data.bdata.len() != n_border * CHANNELS {
            return Err(Error::Topology(format!(
                "bdata holds {} floats, expected {}",
                data.bdata.len(),
                n_border * CHANNELS
            )));
        }
        if data.seg_offsets.last() != Some(&n_border) {
            return Err(Error::Topology("segment offsets do not cover the ring".into()));
        }
        // allocate first, then resolve references
        layer.inner = data.grid_samples;
        layer.border = data.border_samples;
        for (i, s) in layer.inner.iter().enumerate() {
            if s.x >= data.width || s.y >= data.height {
                return Err(Error::Topology(format!("inner sample {i} lies outside the grid")));
            }
            check_refs(&s.inner_nbrs, n_inner, "inner", i)?;
            check_refs(&s.border_nbrs, n_border, "border", i)?;
        }
        for (i, b) in layer.border.iter().enumerate() {
            if b.prev >= n_border || b.next >= n_border || b.segs.is_empty() {
                return Err(Error::Topology(format!("border sample {i} has a broken ring entry")));
            }
            check_refs(&b.inner_nbrs, n_inner, "inner", i)?;
            check_refs(&b.border_nbrs, n_border, "border", i)?;
            for l in &b.links {
                if l.target.layer == data.index {
                    if let Some(t) = l.target.sample.border() {
                        if t >= n_border {
                            return Err(Error::Topology(format!(
                                "border sample {i} links to missing sample {t}"
                            )));
                        }
                    }
                }
            }
        }
        if let Some(t) = data.tref {
            if t >= n_inner {
                return Err(Error::Topology(format!("time reference {t} is not a sample")));
            }
        }
        layer.fgrid = data.fgrid;
        layer.bdata = data.bdata;
        layer.seg_offsets = data.seg_offsets;
        layer.tref = data.tref;
        layer.has_isoline = data.has_isoline;
        layer.finalize();
        Ok(layer)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_data())?)
    }

    pub fn from_json(s: &str) -> Result<MeshLayer> {
        MeshLayer::from_data(serde_json::from_str(s)?)
    }
}

fn check_refs(refs: &[usize], len: usize, what: &str, owner: usize) -> Result<()> {
    match refs.iter().find(|&&r| r >= len) {
        Some(r) => Err(Error::Topology(format!(
            "sample {owner} refers to missing {what} sample {r}"
        ))),
        None => Ok(()),
    }
}

/// `f64` with NaN as `null`.
pub(crate) mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_nan() {
            s.serialize_none()
        } else {
            s.serialize_some(v)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
    }
}

/// `Vec<f64>` with NaN entries as `null`.
pub(crate) mod nan_vec {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &[f64], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(v.len()))?;
        for x in v {
            if x.is_nan() {
                seq.serialize_element(&Option::<f64>::None)?;
            } else {
                seq.serialize_element(x)?;
            }
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        let raw = Vec::<Option<f64>>::deserialize(d)?;
        Ok(raw.into_iter().map(|x| x.unwrap_or(f64::NAN)).collect())
    }
}
