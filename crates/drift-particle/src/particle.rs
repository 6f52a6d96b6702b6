//! The particle entity: identity + shape + storage.

use std::fmt;
use std::sync::Arc;

use drift_core::{ConfigError, IdLedger, InitialValue, ParticleId, StatusCode, Value};

use crate::layout::RecordLayout;
use crate::shape::{fields, ParticleShape};
use crate::storage::{InterpretedStore, PackedRecord, ParticleStore};

/// Per-grid index caches a packed particle hands to kernels.
///
/// Kernels cache the grid cell a particle was last located in; the cache
/// buffers live on the particle and their base addresses are written into
/// the `cxi`/`cyi`/`czi`/`cti` record slots. The time cache seeds -1
/// (no cell yet), the spatial caches 0.
#[derive(Clone, Debug)]
pub struct IndexCaches {
    xi: Vec<i32>,
    yi: Vec<i32>,
    zi: Vec<i32>,
    ti: Vec<i32>,
}

impl IndexCaches {
    fn new(grid_count: usize) -> Self {
        Self {
            xi: vec![0; grid_count],
            yi: vec![0; grid_count],
            zi: vec![0; grid_count],
            ti: vec![-1; grid_count],
        }
    }

    /// The cached horizontal cell indices, one per grid.
    pub fn xi(&self) -> &[i32] {
        &self.xi
    }

    /// The cached meridional cell indices, one per grid.
    pub fn yi(&self) -> &[i32] {
        &self.yi
    }

    /// The cached vertical cell indices, one per grid.
    pub fn zi(&self) -> &[i32] {
        &self.zi
    }

    /// The cached time chunk indices, one per grid. -1 means unset.
    pub fn ti(&self) -> &[i32] {
        &self.ti
    }

    fn base_addresses(&self) -> [u64; 4] {
        [
            self.xi.as_ptr() as u64,
            self.yi.as_ptr() as u64,
            self.zi.as_ptr() as u64,
            self.ti.as_ptr() as u64,
        ]
    }
}

/// One particle: an identity, a shape, and a storage surface.
#[derive(Debug)]
pub struct Particle {
    id: ParticleId,
    shape: Arc<ParticleShape>,
    store: ParticleStore,
    state: StatusCode,
    next_dt: Option<f64>,
    caches: Option<IndexCaches>,
}

impl Particle {
    /// The particle's identity.
    pub fn id(&self) -> ParticleId {
        self.id
    }

    /// The shape this particle was constructed from.
    pub fn shape(&self) -> &ParticleShape {
        &self.shape
    }

    /// Whether the particle lives in packed (kernel-visible) storage.
    pub fn is_packed(&self) -> bool {
        matches!(self.store, ParticleStore::Packed(_))
    }

    /// Read a field by name.
    pub fn get(&self, name: &str) -> Result<Value, ConfigError> {
        self.store.get(name)
    }

    /// Write a field by name, coercing to its declared type.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), ConfigError> {
        self.store.set(name, value)
    }

    /// The current execution status.
    pub fn state(&self) -> StatusCode {
        self.state
    }

    /// Set the execution status, mirroring it into the record's `state`
    /// field so kernels observe it.
    pub fn set_state(&mut self, state: StatusCode) {
        self.state = state;
        if self.shape.spec(fields::STATE).is_some() {
            // state is a built-in int32 slot; the write cannot fail.
            let mirrored = self.store.set(fields::STATE, Value::I32(state.as_i32()));
            debug_assert!(mirrored.is_ok());
        }
    }

    /// Mark the particle for removal from its set.
    pub fn delete(&mut self) {
        self.set_state(StatusCode::Delete);
    }

    /// Reset the status to success.
    pub fn reset_state(&mut self) {
        self.set_state(StatusCode::Success);
    }

    /// Stage or apply a pending timestep override.
    ///
    /// `Some(dt)` stages an override without touching the `dt` field;
    /// `None` applies a previously staged override to the field and
    /// clears it (a no-op when nothing is staged).
    pub fn update_next_dt(&mut self, next_dt: Option<f64>) -> Result<(), ConfigError> {
        match next_dt {
            Some(dt) => {
                self.next_dt = Some(dt);
                Ok(())
            }
            None => match self.next_dt.take() {
                Some(dt) => self.store.set(fields::DT, Value::F64(dt)),
                None => Ok(()),
            },
        }
    }

    /// The staged timestep override, if any.
    pub fn next_dt(&self) -> Option<f64> {
        self.next_dt
    }

    /// Raw base pointer of the packed record, for handing to native code.
    /// `None` in interpreted mode.
    pub fn record_ptr(&mut self) -> Option<*mut u8> {
        self.store.as_packed_mut().map(PackedRecord::as_ptr)
    }

    /// The kernel grid-index caches. `None` in interpreted mode.
    pub fn index_caches(&self) -> Option<&IndexCaches> {
        self.caches.as_ref()
    }
}

impl fmt::Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spatial = |name: &str| self.get(name).map(|v| v.as_f64()).unwrap_or(f64::NAN);
        write!(
            f,
            "P[{}](lon={}, lat={}, depth={}",
            self.id,
            spatial(fields::LON),
            spatial(fields::LAT),
            spatial(fields::DEPTH),
        )?;
        for spec in self.shape.iter() {
            if !spec.to_write()
                || matches!(
                    spec.name(),
                    fields::LON | fields::LAT | fields::DEPTH | fields::TIME | fields::ID
                )
            {
                continue;
            }
            if let Ok(value) = self.get(spec.name()) {
                write!(f, ", {}={}", spec.name(), value)?;
            }
        }
        write!(f, ", time={})", spatial(fields::TIME))
    }
}

/// Builds a [`Particle`] from a shape, an identity, and release
/// coordinates.
#[derive(Clone, Debug)]
pub struct ParticleBuilder {
    shape: Arc<ParticleShape>,
    id: ParticleId,
    lon: f64,
    lat: f64,
    depth: f64,
    time: Option<f64>,
    packed: bool,
    grid_count: usize,
}

impl ParticleBuilder {
    /// Start building a particle of `shape` with the explicit `id`.
    pub fn new(shape: Arc<ParticleShape>, id: ParticleId) -> Self {
        Self {
            shape,
            id,
            lon: 0.0,
            lat: 0.0,
            depth: 0.0,
            time: None,
            packed: false,
            grid_count: 1,
        }
    }

    /// Release longitude, degrees east.
    pub fn lon(mut self, lon: f64) -> Self {
        self.lon = lon;
        self
    }

    /// Release latitude, degrees north.
    pub fn lat(mut self, lat: f64) -> Self {
        self.lat = lat;
        self
    }

    /// Release depth. Defaults to 0.
    pub fn depth(mut self, depth: f64) -> Self {
        self.depth = depth;
        self
    }

    /// Release time. Required when any field's initial value is sampled
    /// from a physical field; otherwise defaults to 0.
    pub fn time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    /// Store the particle as one packed record kernels can consume.
    pub fn packed(mut self) -> Self {
        self.packed = true;
        self
    }

    /// Number of grids the kernel index caches cover. Defaults to 1.
    pub fn grid_count(mut self, grid_count: usize) -> Self {
        self.grid_count = grid_count;
        self
    }

    /// Construct the particle.
    ///
    /// The ledger is advanced with the explicit id first, then every
    /// field resolves in shape order: builder-supplied spatial/time
    /// values win, then literal defaults, then deferred sampling (which
    /// requires a time), then the type's zero. Packed particles also
    /// allocate their kernel index caches and record the cache base
    /// addresses.
    ///
    /// # Errors
    ///
    /// `ConfigError::UnsupportedType` when packing a shape with an
    /// unpackable field type; `ConfigError::MissingTime` when a sampled
    /// field is requested without a time; `ConfigError::TypeMismatch`
    /// when a literal default cannot coerce to its field's type.
    pub fn build(self, ledger: &IdLedger) -> Result<Particle, ConfigError> {
        ledger.observe(self.id);

        let mut store = if self.packed {
            let layout = Arc::new(RecordLayout::compute(&self.shape)?);
            ParticleStore::Packed(PackedRecord::new(layout))
        } else {
            ParticleStore::Interpreted(InterpretedStore::for_shape(&self.shape))
        };

        for spec in self.shape.iter() {
            let value = match spec.name() {
                fields::LON => Value::F64(self.lon),
                fields::LAT => Value::F64(self.lat),
                fields::DEPTH => Value::F64(self.depth),
                fields::TIME => Value::F64(self.time.unwrap_or(0.0)),
                fields::ID => Value::I64(self.id.0),
                fields::DT => Value::F32(f32::NAN),
                fields::STATE => Value::I32(StatusCode::Success.as_i32()),
                _ => match spec.initial() {
                    InitialValue::Literal(value) => *value,
                    InitialValue::Sampled(source) => {
                        let time = self.time.ok_or_else(|| ConfigError::MissingTime {
                            field: spec.name().to_string(),
                        })?;
                        source.resolve_time_window(time, 0);
                        Value::F64(source.sample(time, self.depth, self.lat, self.lon))
                    }
                    InitialValue::Unset => spec.value_type().zero(),
                },
            };
            store.set(spec.name(), value)?;
        }

        let caches = if self.packed {
            let caches = IndexCaches::new(self.grid_count);
            let addresses = caches.base_addresses();
            for (name, address) in fields::INDEX_CACHES.iter().zip(addresses) {
                if self.shape.spec(name).is_some() {
                    store.set(name, Value::Ptr(address))?;
                }
            }
            Some(caches)
        } else {
            None
        };

        Ok(Particle {
            id: self.id,
            shape: self.shape,
            store,
            state: StatusCode::Success,
            next_dt: None,
            caches,
        })
    }
}
