/// Identifies one raster fetch.
///
/// Handles are issued in increasing order by [`crate::RasterCache`] and never
/// reused, so a stale completion can always be told apart from a newer one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Request(pub u64);

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "raster#{}", self.0)
    }
}
