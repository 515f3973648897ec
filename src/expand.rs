use crate::types::{PartRequest, UnitPart};

/// Expands requests into one [`UnitPart`] per physical piece.
///
/// Working dimensions start equal to the request's. Nothing is rejected here:
/// degenerate requests produce units that simply never get placed.
pub fn expand_requests(requests: &[PartRequest]) -> Vec<UnitPart> {
    let mut parts = Vec::new();
    for (idx, r) in requests.iter().enumerate() {
        for _ in 0..r.qty {
            parts.push(UnitPart {
                id: parts.len(),
                request: idx,
                original_width: r.width,
                original_height: r.height,
                width: r.width,
                height: r.height,
                rotatable: r.rotatable,
                rotated: false,
            });
        }
    }
    parts
}
