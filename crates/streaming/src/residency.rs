/// Lifecycle of a live raster handle: Requested, then Resident once the
/// image bytes arrive. Released handles are forgotten by the cache.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResidencyState {
    Requested,
    Resident,
}
