use std::cmp::Ordering;

use super::{Matcher, PackageId};
use crate::package::version_compare;

/// Orders candidates best first: earlier sources win, then higher
/// versions, then stable over dev.
pub fn select_preferred<M: Matcher + ?Sized>(matcher: &M, candidates: &[PackageId]) -> Vec<PackageId> {
    let mut ranked: Vec<PackageId> = candidates
        .iter()
        .copied()
        .filter(|id| matcher.package(*id).is_some())
        .collect();
    ranked.sort_by(|a, b| compare(matcher, *a, *b));
    ranked
}

fn compare<M: Matcher + ?Sized>(matcher: &M, a: PackageId, b: PackageId) -> Ordering {
    let (Some(pa), Some(pb)) = (matcher.package(a), matcher.package(b)) else {
        return Ordering::Equal;
    };

    let by_source = matcher.source_of(a).cmp(&matcher.source_of(b));
    by_source
        .then_with(|| version_compare(&pb.version, &pa.version))
        .then_with(|| pa.is_dev().cmp(&pb.is_dev()))
}
