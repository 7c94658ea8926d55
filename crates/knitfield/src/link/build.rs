//! Direct link pairing and transitive closure.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::geom2::Rot2;
use crate::mesh::{LinkEntry, MeshLayer, SampleKey};
use crate::sketch::SketchSet;

/// Pair every border sample with the samples of its linked segments.
///
/// A sample whose link maps back onto itself is flagged `self_link` and
/// keeps no entries.
pub fn init_links(layers: &mut [MeshLayer], set: &SketchSet) -> Result<()> {
    let mut updates: Vec<(usize, usize, Vec<LinkEntry>, bool)> = Vec::new();
    for (li, layer) in layers.iter().enumerate() {
        let sketch = set
            .sketches
            .get(layer.index)
            .ok_or_else(|| Error::Topology(format!("layer {li} has no sketch")))?;
        for (bi, b) in layer.border().iter().enumerate() {
            let mut entries: Vec<LinkEntry> = Vec::new();
            let mut self_link = false;
            for &(seg, alpha) in &b.segs {
                let Some(link) = sketch.get_link(seg) else {
                    continue;
                };
                let tl = link.target_sketch;
                let target_layer = layers.get(tl).ok_or_else(|| {
                    Error::Topology(format!("link to sketch {tl} without a layer"))
                })?;
                let alpha_t = link.linked_time(alpha);
                let tb = target_layer
                    .border_at(link.target_segment, alpha_t)
                    .ok_or_else(|| {
                        Error::Topology(format!(
                            "sketch {tl} has no segment {}",
                            link.target_segment
                        ))
                    })?;
                let target = SampleKey::border(tl, tb);
                if tl == li && tb == bi {
                    self_link = true;
                    break;
                }
                if entries.iter().any(|e| e.target == target) {
                    continue;
                }
                let this_t = sketch.tangent(seg, alpha, true);
                let mut tgt_t = set.get(tl).tangent(link.target_segment, alpha_t, true);
                if link.inverted {
                    tgt_t = -tgt_t;
                }
                let has_seam =
                    b.seam_weight > 0.0 || target_layer.border_sample(tb).seam_weight > 0.0;
                entries.push(LinkEntry {
                    target,
                    alpha: alpha_t,
                    rotation: Rot2::between(tgt_t, this_t),
                    transmission: link.resolve_transmission_type(has_seam),
                });
            }
            if self_link {
                entries.clear();
            }
            if self_link || !entries.is_empty() {
                updates.push((li, bi, entries, self_link));
            }
        }
    }
    for layer in layers.iter_mut() {
        for i in 0..layer.border().len() {
            let b = layer.border_sample_mut(i);
            b.links.clear();
            b.direct_link_count = 0;
            b.self_link = false;
        }
    }
    for (li, bi, entries, self_link) in updates {
        let b = layers[li].border_sample_mut(bi);
        b.direct_link_count = entries.len();
        b.links = entries;
        b.self_link = self_link;
    }
    Ok(())
}

/// Make direct links reciprocal, then append the indirect closure of every
/// family with rotations composed along breadth-first paths.
pub fn cross_init(layers: &mut [MeshLayer]) {
    // reciprocity of direct entries
    let mut missing: Vec<(SampleKey, LinkEntry)> = Vec::new();
    for (li, layer) in layers.iter().enumerate() {
        for (bi, b) in layer.border().iter().enumerate() {
            let me = SampleKey::border(li, bi);
            for e in b.direct_links() {
                let Some(ti) = e.target.sample.border() else {
                    continue;
                };
                let t = layers[e.target.layer].border_sample(ti);
                if t.self_link || t.direct_links().iter().any(|f| f.target == me) {
                    continue;
                }
                missing.push((
                    e.target,
                    LinkEntry {
                        target: me,
                        alpha: b.alpha(),
                        rotation: e.rotation.conj(),
                        transmission: e.transmission,
                    },
                ));
            }
        }
    }
    for layer in layers.iter_mut() {
        for i in 0..layer.border().len() {
            let b = layer.border_sample_mut(i);
            let d = b.direct_link_count;
            b.links.truncate(d);
        }
    }
    for (key, entry) in missing {
        if let Some(ti) = key.sample.border() {
            let b = layers[key.layer].border_sample_mut(ti);
            if !b.links.iter().any(|e| e.target == entry.target) {
                b.links.push(entry);
                b.direct_link_count = b.links.len();
            }
        }
    }

    // closure
    let mut indirect: Vec<(SampleKey, Vec<LinkEntry>)> = Vec::new();
    let mut queue: VecDeque<(SampleKey, Rot2)> = VecDeque::new();
    let mut seen: Vec<SampleKey> = Vec::new();
    for (li, layer) in layers.iter().enumerate() {
        for (bi, b) in layer.border().iter().enumerate() {
            if b.direct_link_count == 0 {
                continue;
            }
            let me = SampleKey::border(li, bi);
            queue.clear();
            seen.clear();
            seen.push(me);
            seen.extend(b.direct_links().iter().map(|e| e.target));
            queue.extend(b.direct_links().iter().map(|e| (e.target, e.rotation)));
            let mut extra = Vec::new();
            while let Some((k, rot_k)) = queue.pop_front() {
                let Some(ki) = k.sample.border() else {
                    continue;
                };
                for e in layers[k.layer].border_sample(ki).direct_links() {
                    if seen.contains(&e.target) {
                        continue;
                    }
                    let rot = (rot_k * e.rotation).renormalize();
                    seen.push(e.target);
                    queue.push_back((e.target, rot));
                    extra.push(LinkEntry {
                        target: e.target,
                        alpha: e.alpha,
                        rotation: rot,
                        transmission: e.transmission,
                    });
                }
            }
            if !extra.is_empty() {
                indirect.push((me, extra));
            }
        }
    }
    for (key, extra) in indirect {
        if let Some(bi) = key.sample.border() {
            layers[key.layer].border_sample_mut(bi).links.extend(extra);
        }
    }
}
