//! Co-occurrence threshold policy for group photo searches.

use photos_core::config::AgentConfig;

/// How many of the named people must appear together in a photo.
///
/// Small named groups require everyone. Larger, collective groups ("my
/// family", "the college gang") only require a minimum overlap so a single
/// absent member does not empty the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPolicy {
    pub small_group_max: usize,
    pub large_group_min_matches: usize,
}

impl Default for GroupPolicy {
    fn default() -> Self {
        Self {
            small_group_max: 3,
            large_group_min_matches: 3,
        }
    }
}

impl GroupPolicy {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            small_group_max: config.small_group_max,
            large_group_min_matches: config.large_group_min_matches.max(1),
        }
    }

    /// Minimum number of the `group_size` people a photo must contain.
    pub fn min_matches(&self, group_size: usize) -> usize {
        if group_size <= self.small_group_max {
            group_size
        } else {
            self.large_group_min_matches.min(group_size)
        }
    }

    /// Prompt text describing this policy.
    pub fn describe(&self) -> String {
        format!(
            "For groups of up to {} people, every named person must appear in the photo. \
             For larger groups, a photo must contain at least {} of them.",
            self.small_group_max, self.large_group_min_matches
        )
    }
}
