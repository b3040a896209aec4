//! Assembly of extracted regions into the response set and hand-off to the
//! blob store

use crate::error::CropError;
use crate::extract::ExtractedRegion;
use crate::geometry::Rect;
use crate::store::BlobStore;
use serde::Serialize;
use std::collections::HashSet;

/// Ordered result of one extraction request
#[derive(Debug, Clone, Default)]
pub struct CropSet {
    regions: Vec<ExtractedRegion>,
}

impl CropSet {
    /// Keep the resolver/detector order; never re-sorted here
    pub fn new(regions: Vec<ExtractedRegion>) -> Self {
        Self { regions }
    }

    pub fn count(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[ExtractedRegion] {
        &self.regions
    }

    /// Upload every region in index order and collect the resulting URLs.
    ///
    /// Stops at the first store failure; regions already written stay in
    /// the store.
    pub fn publish(
        &self,
        store: &dyn BlobStore,
        original_filename: &str,
    ) -> Result<Vec<PublishedRegion>, CropError> {
        let stem = file_stem(original_filename);
        let mut taken = HashSet::new();

        self.regions
            .iter()
            .map(|region| {
                let filename = destination_name(&mut taken, region, &stem);
                let url = upload(store, &region.bytes, &filename)?;
                Ok(PublishedRegion {
                    index: region.index,
                    name: region.name.clone(),
                    filename,
                    url,
                    rect: region.rect,
                    width: region.width,
                    height: region.height,
                })
            })
            .collect()
    }
}

/// `<name>_<stem>.<ext>`, with the region index spliced in when another
/// region of the same batch already claimed that path
fn destination_name(taken: &mut HashSet<String>, region: &ExtractedRegion, stem: &str) -> String {
    let name = sanitize(&region.name);
    let ext = region.format.extension();

    let mut filename = format!("{}_{}.{}", name, stem, ext);
    let mut attempt = 0;
    while taken.contains(&filename) {
        filename = match attempt {
            0 => format!("{}_{}_{}.{}", name, region.index, stem, ext),
            n => format!("{}_{}_{}_{}.{}", name, region.index, n, stem, ext),
        };
        attempt += 1;
    }

    taken.insert(filename.clone());
    filename
}

/// A region after it was written to the blob store
#[derive(Debug, Clone, Serialize)]
pub struct PublishedRegion {
    pub index: usize,
    pub name: String,
    pub filename: String,
    pub url: String,
    pub rect: Rect,
    pub width: u32,
    pub height: u32,
}

/// Store `bytes` at `path`, surfacing failures as upload errors
pub fn upload(store: &dyn BlobStore, bytes: &[u8], path: &str) -> Result<String, CropError> {
    store.store(bytes, path).map_err(|source| {
        tracing::warn!("Store '{}' failed writing {}: {}", store.name(), path, source);
        CropError::Upload {
            path: path.to_string(),
            source,
        }
    })
}

/// Restrict a name to characters safe in object paths
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Sanitized filename without its extension
pub fn file_stem(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let stem = match base.rfind('.') {
        Some(dot) if dot > 0 => &base[..dot],
        _ => base,
    };
    sanitize(stem)
}
