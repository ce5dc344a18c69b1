//! The hosting page as seen by the shell: address-bar fragment, new browsing
//! contexts, document title and the two body flags styling keys off.

pub trait Browser {
    /// Current fragment without the leading `#`.
    fn fragment(&self) -> String;
    /// Returns true when the fragment text changed, which is when a real
    /// browser fires `hashchange`.
    fn set_fragment(&mut self, fragment: &str) -> bool;
    /// Query string of the page address, without the leading `?`.
    fn search(&self) -> String;
    fn open_window(&mut self, url: &str);
    fn set_loading(&mut self, loading: bool);
    fn set_checking(&mut self, checking: bool);
    fn title(&self) -> String;
    fn set_title(&mut self, title: &str);
}

/// Headless browser state. Flag writes that change a value are recorded so
/// callers can count transitions.
#[derive(Debug, Clone, Default)]
pub struct MemoryBrowser {
    fragment: String,
    search: String,
    title: String,
    loading: bool,
    checking: bool,
    pub opened: Vec<String>,
    pub loading_transitions: Vec<bool>,
}

impl MemoryBrowser {
    pub fn new(fragment: &str, search: &str, title: &str) -> Self {
        Self {
            fragment: fragment.trim_start_matches('#').to_string(),
            search: search.trim_start_matches('?').to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_checking(&self) -> bool {
        self.checking
    }
}

impl Browser for MemoryBrowser {
    fn fragment(&self) -> String {
        self.fragment.clone()
    }

    fn set_fragment(&mut self, fragment: &str) -> bool {
        let fragment = fragment.trim_start_matches('#');
        if self.fragment == fragment {
            return false;
        }
        self.fragment = fragment.to_string();
        true
    }

    fn search(&self) -> String {
        self.search.clone()
    }

    fn open_window(&mut self, url: &str) {
        self.opened.push(url.to_string());
    }

    fn set_loading(&mut self, loading: bool) {
        if self.loading != loading {
            self.loading = loading;
            self.loading_transitions.push(loading);
        }
    }

    fn set_checking(&mut self, checking: bool) {
        self.checking = checking;
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_fragment_reports_change_only() {
        let mut b = MemoryBrowser::new("#abc", "", "Profiler");
        assert_eq!(b.fragment(), "abc");
        assert!(!b.set_fragment("abc"));
        assert!(!b.set_fragment("#abc"));
        assert!(b.set_fragment("def"));
        assert_eq!(b.fragment(), "def");
    }

    #[test]
    fn test_loading_transitions_recorded_once_per_change() {
        let mut b = MemoryBrowser::default();
        b.set_loading(true);
        b.set_loading(true);
        b.set_loading(false);
        b.set_loading(false);
        assert_eq!(b.loading_transitions, vec![true, false]);
        assert!(!b.is_loading());
    }
}
