//! Run progress reporting.
//!
//! A run advances through fixed milestones:
//!
//! | Percent | Message |
//! |---------|---------|
//! | 5 | Gathering relevant information... |
//! | 10 | Processing search results... |
//! | +⌊80 / urls⌋ per URL | Researching company {topic}... |
//! | +5 | Generating report... |
//! | 100 | Completed |
//!
//! The per-URL topic walks through the search suffixes (skipping the bare
//! query) in step with discovery order, so the label roughly follows what the
//! current page was found for.

use tracing::info;

/// One progress update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub percent: u8,
    pub message: String,
}

impl ProgressEvent {
    fn new(percent: usize, message: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100) as u8,
            message: message.into(),
        }
    }
}

/// Receives progress updates for a run.
pub trait ProgressSink {
    fn emit(&self, event: ProgressEvent);
}

/// Logs progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn emit(&self, event: ProgressEvent) {
        info!(percent = event.percent, "{}", event.message);
    }
}

/// Computes the progress events of one run. Create one per run.
#[derive(Debug)]
pub struct ProgressTracker<'a> {
    suffixes: &'a [String],
    percent: usize,
    per_url: usize,
    urls_per_topic: usize,
    topic: &'a str,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(suffixes: &'a [String]) -> Self {
        Self {
            suffixes,
            percent: 0,
            per_url: 0,
            urls_per_topic: 1,
            topic: "",
        }
    }

    pub fn started(&mut self) -> ProgressEvent {
        self.percent = 5;
        ProgressEvent::new(self.percent, "Gathering relevant information...")
    }

    pub fn discovered(&mut self, url_count: usize) -> ProgressEvent {
        self.percent += 5;
        self.per_url = 80usize.checked_div(url_count).unwrap_or(0);
        let topics = self.suffixes.len().saturating_sub(1).max(1);
        self.urls_per_topic = (url_count / topics).max(1);
        ProgressEvent::new(self.percent, "Processing search results...")
    }

    /// Event for the URL at `index` (discovery order).
    pub fn researching(&mut self, index: usize) -> ProgressEvent {
        self.percent += self.per_url;
        if index % self.urls_per_topic == 0 {
            let last = self.suffixes.len().saturating_sub(1);
            let topic_index = (index / self.urls_per_topic + 1).min(last);
            self.topic = self.suffixes.get(topic_index).map(String::as_str).unwrap_or("");
        }
        let prefix = if self.topic.contains("company") {
            "Researching"
        } else {
            "Researching company"
        };
        let message = format!("{} {}...", prefix, self.topic)
            .replace(" ...", "...");
        ProgressEvent::new(self.percent, message)
    }

    pub fn generating(&mut self) -> ProgressEvent {
        self.percent += 5;
        ProgressEvent::new(self.percent, "Generating report...")
    }

    pub fn completed(&mut self) -> ProgressEvent {
        self.percent = 100;
        ProgressEvent::new(self.percent, "Completed")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use pretty_assertions::assert_eq;

    /// Collects every event it receives.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) events: parking_lot::Mutex<Vec<ProgressEvent>>,
    }

    impl RecordingSink {
        pub(crate) fn take(&self) -> Vec<ProgressEvent> {
            self.events.lock().drain(..).collect()
        }
    }

    impl ProgressSink for RecordingSink {
        fn emit(&self, event: ProgressEvent) {
            self.events.lock().push(event);
        }
    }

    #[test]
    fn test_milestones() {
        let suffixes = SearchConfig::default().suffixes;
        let mut tracker = ProgressTracker::new(&suffixes);
        assert_eq!(tracker.started().percent, 5);
        assert_eq!(tracker.discovered(18).percent, 10);

        let events: Vec<_> = (0..18).map(|i| tracker.researching(i)).collect();
        // 80 / 18 = 4 per URL
        assert_eq!(events[0].percent, 14);
        assert_eq!(events[17].percent, 10 + 18 * 4);

        assert_eq!(tracker.generating().percent, 87);
        assert_eq!(tracker.completed(), ProgressEvent::new(100, "Completed"));
    }

    #[test]
    fn test_topic_labels_follow_suffixes() {
        let suffixes = SearchConfig::default().suffixes;
        let mut tracker = ProgressTracker::new(&suffixes);
        tracker.started();
        tracker.discovered(18);

        let messages: Vec<_> = (0..18).map(|i| tracker.researching(i).message).collect();
        // 18 URLs / 6 topics = a new topic every 3 URLs
        assert_eq!(messages[0], "Researching company metrics...");
        assert_eq!(messages[2], "Researching company metrics...");
        assert_eq!(messages[3], "Researching company mission and vision...");
        assert_eq!(messages[6], "Researching company milestones...");
        assert_eq!(messages[15], "Researching company funding...");
        assert_eq!(messages[17], "Researching company funding...");
    }

    #[test]
    fn test_topic_index_is_capped_at_last_suffix() {
        let suffixes = SearchConfig::default().suffixes;
        let mut tracker = ProgressTracker::new(&suffixes);
        tracker.discovered(20);
        let last = (0..20).map(|i| tracker.researching(i)).last().unwrap();
        assert_eq!(last.message, "Researching company funding...");
    }

    #[test]
    fn test_fewer_urls_than_topics() {
        let suffixes = SearchConfig::default().suffixes;
        let mut tracker = ProgressTracker::new(&suffixes);
        tracker.started();
        tracker.discovered(2);
        assert_eq!(tracker.researching(0).message, "Researching company metrics...");
        assert_eq!(
            tracker.researching(1).message,
            "Researching company mission and vision..."
        );
    }

    #[test]
    fn test_no_urls_does_not_divide_by_zero() {
        let suffixes = vec![String::new()];
        let mut tracker = ProgressTracker::new(&suffixes);
        tracker.started();
        assert_eq!(tracker.discovered(0).percent, 10);
        assert_eq!(tracker.generating().percent, 15);
    }

    #[test]
    fn test_single_bare_suffix_label() {
        let suffixes = vec![String::new()];
        let mut tracker = ProgressTracker::new(&suffixes);
        tracker.discovered(3);
        assert_eq!(tracker.researching(0).message, "Researching company...");
    }
}
