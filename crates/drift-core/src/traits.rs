//! Trait seam to external sampled physical fields.

/// An external physical field a particle attribute can be initialised from.
///
/// Implemented by field-set collaborators outside this crate; drift only
/// drives the call protocol and never interpolates itself.
///
/// # Contract
///
/// - [`resolve_time_window`](SampledField::resolve_time_window) is invoked
///   before every [`sample`](SampledField::sample) so the source can page
///   in the time chunk covering `time`. Implementations use interior
///   mutability; both calls take `&self`.
/// - `sample` returns the field value at `(time, depth, lat, lon)` in the
///   source's own units.
///
/// This trait is object-safe; specs hold sources as
/// `Arc<dyn SampledField>`.
pub trait SampledField: Send + Sync {
    /// Prepare the source for sampling at `time`.
    ///
    /// `chunk_index` selects the time chunk relative to `time`; initial
    /// value resolution always passes 0.
    fn resolve_time_window(&self, time: f64, chunk_index: usize);

    /// Sample the field at a point.
    fn sample(&self, time: f64, depth: f64, lat: f64, lon: f64) -> f64;
}
