use std::fmt;

/// Error returned when a configured resource limit is exceeded while allocating.
///
/// Hosts that evaluate untrusted templates can bound how much a single heap may
/// hold; everything else leaves the limits disabled and never sees this error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Maximum number of live heap allocations exceeded.
    Allocation { limit: usize, count: usize },
    /// Maximum heap memory exceeded.
    Memory { limit: usize, used: usize },
    /// Maximum nesting depth exceeded while walking nested containers.
    Recursion { limit: usize, depth: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation { limit, count } => {
                write!(f, "allocation limit exceeded: {count} > {limit}")
            }
            Self::Memory { limit, used } => {
                write!(f, "memory limit exceeded: {used} bytes > {limit} bytes")
            }
            Self::Recursion { limit, .. } => {
                write!(f, "maximum nesting depth of {limit} exceeded")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// Trait for tracking heap usage.
///
/// The heap calls `on_allocate` before storing a new payload and `on_free` with the
/// same size once the payload is destroyed, so a tracker always sees balanced calls.
pub trait ResourceTracker: fmt::Debug {
    /// Called before each heap allocation.
    ///
    /// Returns `Ok(())` if the allocation should proceed, or `Err(ResourceError)`
    /// if a limit would be exceeded. `get_size` is only evaluated by trackers that
    /// account for memory.
    fn on_allocate(&mut self, get_size: impl FnOnce() -> usize) -> Result<(), ResourceError>;

    /// Called when a payload is freed, with the size reported at allocation time.
    fn on_free(&mut self, size: usize);

    /// Number of allocations that have not been freed yet.
    fn live_allocations(&self) -> usize;

    /// Called before descending into a nested container while formatting or converting.
    ///
    /// Returns `Err(ResourceError::Recursion)` if `current_depth` (the depth before
    /// descending) is already at the limit.
    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError>;
}

/// Nesting limit applied when none is configured.
///
/// Walks that recurse (repr, JSON conversion) stop here instead of exhausting the
/// stack; equality and release do not recurse and have no limit.
pub const DEFAULT_RECURSION_LIMIT: usize = 500;

fn check_depth(limit: Option<usize>, current_depth: usize) -> Result<(), ResourceError> {
    match limit {
        Some(limit) if current_depth >= limit => Err(ResourceError::Recursion {
            limit,
            depth: current_depth + 1,
        }),
        _ => Ok(()),
    }
}

/// A resource tracker that imposes no limits.
///
/// Only keeps a live allocation counter, which is what leak tests assert on. The
/// nesting limit is [`DEFAULT_RECURSION_LIMIT`].
#[derive(Debug, Default, Clone)]
pub struct NoLimitTracker {
    live: usize,
}

impl ResourceTracker for NoLimitTracker {
    #[inline]
    fn on_allocate(&mut self, _: impl FnOnce() -> usize) -> Result<(), ResourceError> {
        self.live += 1;
        Ok(())
    }

    #[inline]
    fn on_free(&mut self, _: usize) {
        self.live -= 1;
    }

    #[inline]
    fn live_allocations(&self) -> usize {
        self.live
    }

    #[inline]
    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError> {
        check_depth(Some(DEFAULT_RECURSION_LIMIT), current_depth)
    }
}

/// Configuration for resource limits.
///
/// All limits are optional - set to `None` to disable a specific limit.
/// Hosts usually load this from their own configuration file, hence the serde derives.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Maximum number of live heap allocations.
    pub max_allocations: Option<usize>,
    /// Maximum heap memory in bytes (approximate, measured when a payload is allocated).
    pub max_memory: Option<usize>,
    /// Maximum nesting depth for repr and JSON conversion.
    ///
    /// Disabling it lets deeply nested values overflow the stack in those walks.
    pub max_recursion_depth: Option<usize>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_allocations: None,
            max_memory: None,
            max_recursion_depth: Some(DEFAULT_RECURSION_LIMIT),
        }
    }
}

impl ResourceLimits {
    /// Creates a new `ResourceLimits` with every limit disabled, except the nesting
    /// depth which is set to [`DEFAULT_RECURSION_LIMIT`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of live allocations.
    #[must_use]
    pub fn max_allocations(mut self, limit: usize) -> Self {
        self.max_allocations = Some(limit);
        self
    }

    /// Sets the maximum memory usage in bytes.
    #[must_use]
    pub fn max_memory(mut self, limit: usize) -> Self {
        self.max_memory = Some(limit);
        self
    }

    /// Sets the maximum nesting depth.
    #[must_use]
    pub fn max_recursion_depth(mut self, limit: Option<usize>) -> Self {
        self.max_recursion_depth = limit;
        self
    }
}

/// A resource tracker that enforces configurable limits.
///
/// Tracks the live allocation count, the total number of allocations ever made and
/// the approximate memory held, returning errors when a limit would be exceeded.
#[derive(Debug)]
pub struct LimitedTracker {
    limits: ResourceLimits,
    /// Allocations made over the tracker's lifetime.
    total_allocations: usize,
    /// Allocations not yet freed.
    live: usize,
    /// Current approximate memory usage in bytes.
    current_memory: usize,
}

impl LimitedTracker {
    /// Creates a new `LimitedTracker` with the given limits.
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            total_allocations: 0,
            live: 0,
            current_memory: 0,
        }
    }

    /// Returns the configured limits.
    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Returns the number of allocations made since the tracker was created.
    #[must_use]
    pub fn total_allocations(&self) -> usize {
        self.total_allocations
    }

    /// Returns the current approximate memory usage.
    #[must_use]
    pub fn current_memory(&self) -> usize {
        self.current_memory
    }
}

impl ResourceTracker for LimitedTracker {
    fn on_allocate(&mut self, get_size: impl FnOnce() -> usize) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_allocations
            && self.live >= max
        {
            return Err(ResourceError::Allocation {
                limit: max,
                count: self.live + 1,
            });
        }

        let size = get_size();
        if let Some(max) = self.limits.max_memory {
            let new_memory = self.current_memory + size;
            if new_memory > max {
                return Err(ResourceError::Memory {
                    limit: max,
                    used: new_memory,
                });
            }
        }

        self.total_allocations += 1;
        self.live += 1;
        self.current_memory += size;
        Ok(())
    }

    fn on_free(&mut self, size: usize) {
        self.live -= 1;
        self.current_memory = self.current_memory.saturating_sub(size);
    }

    fn live_allocations(&self) -> usize {
        self.live
    }

    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError> {
        check_depth(self.limits.max_recursion_depth, current_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_limit_counts_live_entries() {
        let mut tracker = LimitedTracker::new(ResourceLimits::new().max_allocations(2));
        assert!(tracker.on_allocate(|| 8).is_ok());
        assert!(tracker.on_allocate(|| 8).is_ok());
        assert_eq!(
            tracker.on_allocate(|| 8),
            Err(ResourceError::Allocation { limit: 2, count: 3 })
        );

        // freeing makes room again
        tracker.on_free(8);
        assert!(tracker.on_allocate(|| 8).is_ok());
        assert_eq!(tracker.total_allocations(), 3);
        assert_eq!(tracker.live_allocations(), 2);
    }

    #[test]
    fn memory_limit_is_checked_before_counting() {
        let mut tracker = LimitedTracker::new(ResourceLimits::new().max_memory(100));
        assert!(tracker.on_allocate(|| 60).is_ok());
        let err = tracker.on_allocate(|| 60).unwrap_err();
        assert_eq!(err.to_string(), "memory limit exceeded: 120 bytes > 100 bytes");
        assert_eq!(tracker.current_memory(), 60);
        assert_eq!(tracker.live_allocations(), 1);
    }

    #[test]
    fn limits_from_json() {
        let limits: ResourceLimits = serde_json::from_str(r#"{"max_allocations": 10}"#).unwrap();
        assert_eq!(limits, ResourceLimits::new().max_allocations(10));
        assert_eq!(limits.max_recursion_depth, Some(DEFAULT_RECURSION_LIMIT));

        let limits: ResourceLimits = serde_json::from_str(r#"{"max_recursion_depth": null}"#).unwrap();
        assert_eq!(limits.max_recursion_depth, None);
    }

    #[test]
    fn recursion_depth_limit() {
        let tracker = LimitedTracker::new(ResourceLimits::new().max_recursion_depth(Some(2)));
        assert!(tracker.check_recursion_depth(1).is_ok());
        assert_eq!(
            tracker.check_recursion_depth(2),
            Err(ResourceError::Recursion { limit: 2, depth: 3 })
        );
        assert!(NoLimitTracker::default().check_recursion_depth(DEFAULT_RECURSION_LIMIT).is_err());
    }
}
