//! Parallel accumulation of binned statistics over neighbor lists.
//!
//! A [`Histogram`] runs a caller-supplied function over every bond of a
//! [`NeighborList`], using a [`WorkerPool`]. Every worker thread increments
//! its own local copy of the bins, and the local copies are summed into the
//! shared histogram by [`Histogram::reduce`], which runs lazily the first
//! time a result is requested after an accumulation.

use std::cell::RefCell;
use std::ops::AddAssign;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use ndarray::{ArrayD, IxDyn, Zip};
use num_traits::{One, ToPrimitive, Zero};
use rayon::prelude::*;
use thread_local::ThreadLocal;

use crate::Error;
use crate::host::{HostLock, ReleasedHost};
use crate::locality::{Bond, NeighborList, PeriodicBox};

mod bins;
pub use self::bins::BinAxis;

/// Types which can be used as histogram values: integer counts or floating
/// point weights.
pub trait BinValue: Zero + One + ToPrimitive + AddAssign + Copy + Send + Sync + 'static {}

impl<T> BinValue for T where T: Zero + One + ToPrimitive + AddAssign + Copy + Send + Sync + 'static {}

/// A pool of worker threads used for the parallel sections of histograms.
///
/// The pool is created and owned by the caller, and can be shared between
/// multiple histograms.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    pool: Arc<rayon::ThreadPool>,
}

impl WorkerPool {
    /// Create a new pool with `n_threads` worker threads
    pub fn new(n_threads: usize) -> Result<WorkerPool, Error> {
        if n_threads == 0 {
            return Err(Error::InvalidParameter("a worker pool needs at least one thread".into()));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i| format!("periodic-stats-worker-{}", i))
            .build()
            .map_err(|e| Error::InvalidParameter(format!("failed to create worker pool: {}", e)))?;

        Ok(WorkerPool { pool: Arc::new(pool) })
    }

    /// Create a new pool with the default number of threads, usually one
    /// per CPU core
    pub fn with_default_size() -> Result<WorkerPool, Error> {
        let pool = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("periodic-stats-worker-{}", i))
            .build()
            .map_err(|e| Error::InvalidParameter(format!("failed to create worker pool: {}", e)))?;

        Ok(WorkerPool { pool: Arc::new(pool) })
    }

    /// Use an existing rayon thread pool
    pub fn from_pool(pool: Arc<rayon::ThreadPool>) -> WorkerPool {
        WorkerPool { pool }
    }

    /// Number of threads in this pool
    pub fn n_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `function` inside this pool, parallel iterators used by
    /// `function` will run on the workers of this pool.
    pub fn install<R, F>(&self, function: F) -> R where F: FnOnce() -> R + Send, R: Send {
        self.pool.install(function)
    }
}

/// Is the shared histogram up to date with the local ones?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionState {
    /// Some data was accumulated since the last reduction
    Dirty,
    /// The shared histogram contains all the accumulated data
    Reduced,
}

/// Worker-local bins, given to the accumulation callback
pub struct LocalBins<'a, T> {
    bins: &'a mut ArrayD<T>,
}

impl<'a, T: BinValue> LocalBins<'a, T> {
    /// Shape of the bins
    pub fn shape(&self) -> &[usize] {
        self.bins.shape()
    }

    /// Add one to the bin at `index`. This returns `false` and does nothing
    /// if `index` is out of bounds.
    #[inline]
    pub fn increment(&mut self, index: &[usize]) -> bool {
        self.add(index, T::one())
    }

    /// Add `value` to the bin at `index`. This returns `false` and does
    /// nothing if `index` is out of bounds.
    #[inline]
    pub fn add(&mut self, index: &[usize], value: T) -> bool {
        match self.bins.get_mut(index) {
            Some(bin) => {
                *bin += value;
                true
            }
            None => false,
        }
    }
}

/// Running totals over accumulated frames, used for normalization
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct FrameTotals {
    n_frames: usize,
    n_query_points: usize,
    density_sum: f64,
}

impl FrameTotals {
    fn merge(&mut self, other: FrameTotals) {
        self.n_frames += other.n_frames;
        self.n_query_points += other.n_query_points;
        self.density_sum += other.density_sum;
    }
}

/// A multi-dimensional histogram filled in parallel from neighbor lists.
///
/// The normalized histogram is `bin_counts * jacobian / (N_q * ρ)`, where
/// `N_q` is the total number of query points over all accumulated frames,
/// `ρ` the mean density of points, and `jacobian` an optional per-bin factor
/// (typically the inverse of the bin volume) given by the statistic using
/// this histogram.
///
/// Integer counts are reduced exactly. Floating point values can differ in
/// the last bits depending on the number of workers, since the order of the
/// additions changes.
pub struct Histogram<T: BinValue> {
    pool: WorkerPool,
    locals: ThreadLocal<RefCell<ArrayD<T>>>,
    bin_counts: ArrayD<T>,
    jacobian: Option<ArrayD<f64>>,
    normalized: ArrayD<f64>,
    state: ReductionState,
    reduced: FrameTotals,
    pending: FrameTotals,
}

impl<T: BinValue> std::fmt::Debug for Histogram<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Histogram")
            .field("shape", &self.bin_counts.shape())
            .field("state", &self.state)
            .field("n_frames", &self.n_frames())
            .finish_non_exhaustive()
    }
}

impl<T: BinValue> Histogram<T> {
    /// Create a new histogram with the given `shape`, running parallel
    /// sections on `pool`.
    pub fn new(shape: &[usize], pool: WorkerPool) -> Result<Histogram<T>, Error> {
        if shape.is_empty() || shape.contains(&0) {
            return Err(Error::InvalidParameter(format!(
                "invalid histogram shape {:?}, all dimensions must be at least 1", shape
            )));
        }

        Ok(Histogram {
            pool: pool,
            locals: ThreadLocal::new(),
            bin_counts: ArrayD::zeros(IxDyn(shape)),
            jacobian: None,
            normalized: ArrayD::zeros(IxDyn(shape)),
            state: ReductionState::Reduced,
            reduced: FrameTotals::default(),
            pending: FrameTotals::default(),
        })
    }

    /// Set the per-bin factor used when normalizing the histogram
    pub fn set_jacobian(&mut self, jacobian: ArrayD<f64>) -> Result<(), Error> {
        if jacobian.shape() != self.bin_counts.shape() {
            return Err(Error::ShapeMismatch(format!(
                "jacobian shape {:?} does not match histogram shape {:?}",
                jacobian.shape(), self.bin_counts.shape()
            )));
        }

        self.jacobian = Some(jacobian);
        self.normalize();
        Ok(())
    }

    /// Get the shape of this histogram
    pub fn shape(&self) -> &[usize] {
        self.bin_counts.shape()
    }

    /// Get the current reduction state
    pub fn state(&self) -> ReductionState {
        self.state
    }

    /// Get the number of frames accumulated since the last reset
    pub fn n_frames(&self) -> usize {
        self.reduced.n_frames + self.pending.n_frames
    }

    /// Get the worker pool used by this histogram
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Zero the histogram and forget about all accumulated frames
    pub fn reset(&mut self) {
        for local in self.locals.iter_mut() {
            local.get_mut().fill(T::zero());
        }
        self.bin_counts.fill(T::zero());
        self.normalized.fill(0.0);
        self.reduced = FrameTotals::default();
        self.pending = FrameTotals::default();
        self.state = ReductionState::Reduced;
    }

    /// Run `callback` for every bond in `neighbors`, giving it the local bins
    /// of the current worker.
    ///
    /// The query points are split in contiguous ranges, one per worker. The
    /// neighbor list must have been built for `n_query_points` query points
    /// and `n_points` points in `simulation_box`.
    ///
    /// If `callback` panics, the panic is reported as `Error::Panic` and the
    /// bonds already added by this call are discarded. Frames accumulated by
    /// previous calls are kept.
    #[time_graph::instrument(name = "Histogram::accumulate")]
    pub fn accumulate<F>(
        &mut self,
        simulation_box: &PeriodicBox,
        n_query_points: usize,
        neighbors: &NeighborList,
        n_points: usize,
        callback: F,
    ) -> Result<(), Error> where F: Fn(&mut LocalBins<'_, T>, &Bond) + Sync {
        neighbors.validate(n_query_points, n_points)?;

        // the local bins must only contain this frame, so they can be
        // cleared if the callback panics
        if self.state == ReductionState::Dirty {
            self.flush_locals();
        }

        let shape = self.bin_counts.raw_dim();
        let locals = &self.locals;
        let n_chunks = self.pool.n_threads();
        let chunk_size = usize::max(n_query_points.div_ceil(n_chunks), 1);

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.pool.install(|| {
                (0..n_chunks).into_par_iter().for_each(|chunk| {
                    let begin = chunk * chunk_size;
                    let end = usize::min(begin + chunk_size, n_query_points);
                    if begin >= end {
                        return;
                    }

                    let local = locals.get_or(|| RefCell::new(ArrayD::zeros(shape.clone())));
                    let mut local = local.borrow_mut();
                    let mut bins = LocalBins { bins: &mut local };

                    let first = neighbors.find_first_index(begin);
                    for bond in &neighbors.bonds()[first..] {
                        if bond.query_point >= end {
                            break;
                        }
                        callback(&mut bins, bond);
                    }
                });
            });
        }));

        if let Err(payload) = result {
            self.clear_locals();
            return Err(Error::from(payload));
        }

        self.pending.merge(FrameTotals {
            n_frames: 1,
            n_query_points: n_query_points,
            density_sum: n_points as f64 / simulation_box.volume(),
        });
        self.state = ReductionState::Dirty;

        return Ok(());
    }

    /// Same as [`Histogram::accumulate`], releasing the `host` lock during
    /// the accumulation. The lock is always reacquired before returning.
    pub fn accumulate_released<H, F>(
        &mut self,
        host: &H,
        simulation_box: &PeriodicBox,
        n_query_points: usize,
        neighbors: &NeighborList,
        n_points: usize,
        callback: F,
    ) -> Result<(), Error> where H: HostLock + ?Sized, F: Fn(&mut LocalBins<'_, T>, &Bond) + Sync {
        let _released = ReleasedHost::new(host);
        self.accumulate(simulation_box, n_query_points, neighbors, n_points, callback)
    }

    /// Zero all the local bins
    fn clear_locals(&mut self) {
        for local in self.locals.iter_mut() {
            local.get_mut().fill(T::zero());
        }
    }

    /// Add all the local bins to `bin_counts`, and zero them. The frame
    /// totals and the normalized histogram are not updated.
    fn flush_locals(&mut self) {
        let bin_counts = &mut self.bin_counts;
        let locals = &mut self.locals;
        self.pool.install(|| {
            for local in locals.iter_mut() {
                let local = local.get_mut();
                Zip::from(&mut *bin_counts).and(&*local).par_for_each(|total, &value| {
                    *total += value;
                });
                local.fill(T::zero());
            }
        });
    }

    /// Sum all the local histograms into the shared one, and update the
    /// normalized histogram. This does nothing if the histogram is already
    /// reduced.
    #[time_graph::instrument(name = "Histogram::reduce")]
    pub fn reduce(&mut self) {
        if self.state == ReductionState::Reduced {
            return;
        }

        self.flush_locals();
        self.reduced.merge(self.pending);
        self.pending = FrameTotals::default();
        self.normalize();
        self.state = ReductionState::Reduced;
    }

    fn normalize(&mut self) {
        let totals = self.reduced;
        let factor = if totals.n_query_points > 0 && totals.density_sum > 0.0 {
            let mean_density = totals.density_sum / totals.n_frames as f64;
            1.0 / (totals.n_query_points as f64 * mean_density)
        } else {
            0.0
        };

        let normalized = &mut self.normalized;
        let bin_counts = &self.bin_counts;
        let jacobian = &self.jacobian;
        self.pool.install(|| {
            Zip::from(&mut *normalized).and(bin_counts).par_for_each(|normalized, &count| {
                *normalized = count.to_f64().unwrap_or(f64::NAN) * factor;
            });

            if let Some(jacobian) = jacobian {
                Zip::from(&mut *normalized).and(jacobian).par_for_each(|normalized, &jacobian| {
                    *normalized *= jacobian;
                });
            }
        });
    }

    /// Get the reduced bin counts, reducing the histogram if needed
    pub fn bin_counts(&mut self) -> &ArrayD<T> {
        self.reduce();
        &self.bin_counts
    }

    /// Get the normalized histogram, reducing the histogram if needed
    pub fn normalized(&mut self) -> &ArrayD<f64> {
        self.reduce();
        &self.normalized
    }

    /// Get the total number of query points over all accumulated frames
    pub fn n_query_points(&mut self) -> usize {
        self.reduce();
        self.reduced.n_query_points
    }
}
