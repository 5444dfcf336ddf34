//! Fan-out/join execution over indexed workloads.
//!
//! This crate provides the [`Executor`] trait, which abstracts over sequential and parallel
//! execution of the blocking fan-out/join patterns used by the prover and verifier: mapping
//! an index range into an ordered vector, folding a collection, checking a predicate over a
//! range, and running a small fixed set of heterogeneous tasks to completion.
//!
//! # Overview
//!
//! **Core Operations:**
//! - [`fold_init`](Executor::fold_init): Reduces a collection with per-partition state
//! - [`join`](Executor::join): Runs two closures to completion and returns both results
//! - [`invoke`](Executor::invoke): Runs a vector of boxed tasks and returns their results in order
//!
//! **Convenience Methods:**
//! - [`fold`](Executor::fold): Reduces a collection to a single value
//! - [`map_collect_vec`](Executor::map_collect_vec): Maps elements and collects into a `Vec`
//! - [`map_range`](Executor::map_range): Evaluates `f(i)` for every `i` in `0..n`
//! - [`all`](Executor::all): Checks a predicate for every `i` in `0..n`
//!
//! Every operation blocks until all sub-tasks complete and always returns results in index
//! order, so output never depends on scheduling. Callers that feed results into a
//! Fiat-Shamir transcript can therefore hash them directly.
//!
//! Two implementations are provided:
//!
//! - [`Sequential`]: Executes operations on the current thread (works in `no_std`)
//! - [`Parallel`]: Executes operations on a bounded rayon thread pool (requires `std`)
//!
//! # Example
//!
//! ```
//! use pod_parallel::{Executor, Sequential};
//!
//! fn sum_of_squares<E: Executor>(executor: &E, data: &[i64]) -> i64 {
//!     executor.fold(
//!         data,
//!         || 0i64,
//!         |acc, &x| acc + x * x,
//!         |a, b| a + b,
//!     )
//! }
//!
//! let data = vec![1, 2, 3, 4, 5];
//! assert_eq!(sum_of_squares(&Sequential, &data), 55);
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]

use cfg_if::cfg_if;
use core::fmt;

cfg_if! {
    if #[cfg(feature = "std")] {
        use rayon::{
            iter::{IntoParallelIterator, ParallelBridge, ParallelIterator},
            ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder,
        };
        use std::sync::Arc;
    } else {
        extern crate alloc;
        use alloc::{boxed::Box, vec::Vec};
    }
}

/// A unit of work submitted to [`Executor::invoke`].
pub type Task<'a, T> = Box<dyn FnOnce() -> T + Send + 'a>;

/// An executor for blocking fan-out/join operations.
pub trait Executor: Clone + Send + Sync + fmt::Debug + 'static {
    /// Reduces a collection to a single value with per-partition initialization.
    ///
    /// The `init` value is created once per partition and handed mutably to every
    /// `fold_op` call of that partition (useful for scratch buffers).
    ///
    /// # Examples
    ///
    /// ```
    /// use pod_parallel::{Executor, Sequential};
    ///
    /// let data = vec![1u32, 2, 3, 4, 5];
    /// let result: Vec<String> = Sequential.fold_init(
    ///     &data,
    ///     || String::with_capacity(16),
    ///     Vec::new,
    ///     |mut acc, buf, &n| {
    ///         buf.clear();
    ///         buf.push_str(&n.to_string());
    ///         acc.push(buf.clone());
    ///         acc
    ///     },
    ///     |mut a, b| { a.extend(b); a },
    /// );
    /// assert_eq!(result, vec!["1", "2", "3", "4", "5"]);
    /// ```
    fn fold_init<I, INIT, T, R, ID, F, RD>(
        &self,
        iter: I,
        init: INIT,
        identity: ID,
        fold_op: F,
        reduce_op: RD,
    ) -> R
    where
        I: IntoIterator<IntoIter: Send, Item: Send> + Send,
        INIT: Fn() -> T + Send + Sync,
        T: Send,
        R: Send,
        ID: Fn() -> R + Send + Sync,
        F: Fn(R, &mut T, I::Item) -> R + Send + Sync,
        RD: Fn(R, R) -> R + Send + Sync;

    /// Runs `a` and `b` to completion (potentially concurrently) and returns both results.
    fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send;

    /// Runs every task to completion and returns the results in submission order.
    fn invoke<'a, T: Send>(&self, tasks: Vec<Task<'a, T>>) -> Vec<T>;

    /// Reduces a collection to a single value using fold and reduce operations.
    ///
    /// ```
    /// use pod_parallel::{Executor, Sequential};
    ///
    /// let numbers = vec![1, 2, 3, 4, 5];
    /// let sum = Sequential.fold(&numbers, || 0, |acc, &n| acc + n, |a, b| a + b);
    /// assert_eq!(sum, 15);
    /// ```
    fn fold<I, R, ID, F, RD>(&self, iter: I, identity: ID, fold_op: F, reduce_op: RD) -> R
    where
        I: IntoIterator<IntoIter: Send, Item: Send> + Send,
        R: Send,
        ID: Fn() -> R + Send + Sync,
        F: Fn(R, I::Item) -> R + Send + Sync,
        RD: Fn(R, R) -> R + Send + Sync,
    {
        self.fold_init(
            iter,
            || (),
            identity,
            |acc, _, item| fold_op(acc, item),
            reduce_op,
        )
    }

    /// Maps each element and collects results into a `Vec` that preserves the input order.
    fn map_collect_vec<I, F, T>(&self, iter: I, map_op: F) -> Vec<T>
    where
        I: IntoIterator<IntoIter: Send, Item: Send> + Send,
        F: Fn(I::Item) -> T + Send + Sync,
        T: Send,
    {
        self.fold(
            iter,
            Vec::new,
            |mut acc, item| {
                acc.push(map_op(item));
                acc
            },
            |mut a, b| {
                a.extend(b);
                a
            },
        )
    }

    /// Evaluates `f(i)` for every `i` in `0..n` and returns the results indexed by `i`.
    ///
    /// ```
    /// use pod_parallel::{Executor, Sequential};
    ///
    /// let squares = Sequential.map_range(4, |i| i * i);
    /// assert_eq!(squares, vec![0, 1, 4, 9]);
    /// ```
    fn map_range<F, T>(&self, n: usize, f: F) -> Vec<T>
    where
        F: Fn(usize) -> T + Send + Sync,
        T: Send,
    {
        self.map_collect_vec(0..n, f)
    }

    /// Returns whether `f(i)` holds for every `i` in `0..n`.
    ///
    /// All predicates are evaluated (there is no early exit), so the amount of work does
    /// not depend on which index fails.
    fn all<F>(&self, n: usize, f: F) -> bool
    where
        F: Fn(usize) -> bool + Send + Sync,
    {
        self.fold(0..n, || true, |acc, i| f(i) && acc, |a, b| a && b)
    }
}

/// A sequential executor.
///
/// Runs every operation on the calling thread, in index order. Useful for tests
/// (deterministic interleaving of logs) and small workloads.
#[derive(Default, Debug, Clone)]
pub struct Sequential;

impl Executor for Sequential {
    fn fold_init<I, INIT, T, R, ID, F, RD>(
        &self,
        iter: I,
        init: INIT,
        identity: ID,
        fold_op: F,
        _reduce_op: RD,
    ) -> R
    where
        I: IntoIterator<IntoIter: Send, Item: Send> + Send,
        INIT: Fn() -> T + Send + Sync,
        T: Send,
        R: Send,
        ID: Fn() -> R + Send + Sync,
        F: Fn(R, &mut T, I::Item) -> R + Send + Sync,
        RD: Fn(R, R) -> R + Send + Sync,
    {
        let mut init_val = init();
        iter.into_iter()
            .fold(identity(), |acc, item| fold_op(acc, &mut init_val, item))
    }

    fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        let ra = a();
        (ra, b())
    }

    fn invoke<'a, T: Send>(&self, tasks: Vec<Task<'a, T>>) -> Vec<T> {
        tasks.into_iter().map(|task| task()).collect()
    }
}

cfg_if! {
    if #[cfg(feature = "std")] {
        /// A parallel executor backed by a rayon thread pool.
        ///
        /// `Parallel` holds an [`Arc<ThreadPool>`], so it can be cheaply cloned and shared
        /// across threads. Nested calls (for example a shard prover that itself maps over
        /// wires) reuse the same pool.
        ///
        /// ```
        /// use pod_parallel::{Executor, Parallel};
        ///
        /// let executor = Parallel::with_concurrency(2).unwrap();
        /// let data: Vec<i64> = (0..1000).collect();
        /// let sum = executor.fold(&data, || 0i64, |acc, &n| acc + n, |a, b| a + b);
        /// assert_eq!(sum, 499500);
        /// ```
        #[derive(Debug, Clone)]
        pub struct Parallel {
            thread_pool: Arc<ThreadPool>,
        }

        impl Parallel {
            /// Creates a new [`Parallel`] executor with the given [`ThreadPool`].
            pub const fn new(thread_pool: Arc<ThreadPool>) -> Self {
                Self { thread_pool }
            }

            /// Creates a new [`Parallel`] executor backed by a dedicated pool of
            /// `concurrency` threads.
            pub fn with_concurrency(concurrency: usize) -> Result<Self, ThreadPoolBuildError> {
                let thread_pool = ThreadPoolBuilder::new().num_threads(concurrency).build()?;
                Ok(Self::new(Arc::new(thread_pool)))
            }
        }

        impl From<Arc<ThreadPool>> for Parallel {
            fn from(thread_pool: Arc<ThreadPool>) -> Self {
                Self::new(thread_pool)
            }
        }

        impl Executor for Parallel {
            fn fold_init<I, INIT, T, R, ID, F, RD>(
                &self,
                iter: I,
                init: INIT,
                identity: ID,
                fold_op: F,
                reduce_op: RD,
            ) -> R
            where
                I: IntoIterator<IntoIter: Send, Item: Send> + Send,
                INIT: Fn() -> T + Send + Sync,
                T: Send,
                R: Send,
                ID: Fn() -> R + Send + Sync,
                F: Fn(R, &mut T, I::Item) -> R + Send + Sync,
                RD: Fn(R, R) -> R + Send + Sync,
            {
                self.thread_pool.install(|| {
                    // par_bridge() doesn't preserve order, so tag each item with its
                    // position and sort before the final in-order reduction.
                    let mut indexed_results: Vec<(usize, R)> = iter
                        .into_iter()
                        .enumerate()
                        .par_bridge()
                        .fold(
                            || (init(), Vec::new()),
                            |(mut init_val, mut results), (idx, item)| {
                                let single_result = fold_op(identity(), &mut init_val, item);
                                results.push((idx, single_result));
                                (init_val, results)
                            },
                        )
                        .map(|(_, results)| results)
                        .reduce(Vec::new, |mut a, b| {
                            a.extend(b);
                            a
                        });
                    indexed_results.sort_by_key(|(idx, _)| *idx);

                    indexed_results
                        .into_iter()
                        .map(|(_, r)| r)
                        .reduce(reduce_op)
                        .unwrap_or_else(identity)
                })
            }

            fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
            where
                A: FnOnce() -> RA + Send,
                B: FnOnce() -> RB + Send,
                RA: Send,
                RB: Send,
            {
                self.thread_pool.install(|| rayon::join(a, b))
            }

            fn invoke<'a, T: Send>(&self, tasks: Vec<Task<'a, T>>) -> Vec<T> {
                self.thread_pool
                    .install(|| tasks.into_par_iter().map(|task| task()).collect())
            }

            fn map_range<F, T>(&self, n: usize, f: F) -> Vec<T>
            where
                F: Fn(usize) -> T + Send + Sync,
                T: Send,
            {
                // Indexed iterators collect in order without the sort in `fold_init`.
                self.thread_pool
                    .install(|| (0..n).into_par_iter().map(f).collect())
            }
        }
    }
}
