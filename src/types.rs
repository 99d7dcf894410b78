use std::convert::Infallible;
use std::str::FromStr;

use crate::protect::Camera;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Which cameras a sync covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraSelection {
    All,
    Ids(Vec<String>),
}

impl FromStr for CameraSelection {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ids: Vec<String> = s
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect();
        if ids.is_empty() || ids.iter().any(|id| id.eq_ignore_ascii_case("all")) {
            Ok(CameraSelection::All)
        } else {
            Ok(CameraSelection::Ids(ids))
        }
    }
}

impl CameraSelection {
    /// Keep the selected cameras, in server order. Returns the requested ids
    /// the server does not know about.
    pub fn apply(&self, cameras: Vec<Camera>) -> (Vec<Camera>, Vec<String>) {
        match self {
            CameraSelection::All => (cameras, Vec::new()),
            CameraSelection::Ids(ids) => {
                let unknown = ids
                    .iter()
                    .filter(|id| !cameras.iter().any(|c| &c.id == *id))
                    .cloned()
                    .collect();
                let selected = cameras.into_iter().filter(|c| ids.contains(&c.id)).collect();
                (selected, unknown)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn cam(id: &str) -> Camera {
        Camera::new(id, id.to_uppercase(), NaiveDateTime::default())
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!("all".parse::<CameraSelection>().unwrap(), CameraSelection::All);
        assert_eq!("ALL".parse::<CameraSelection>().unwrap(), CameraSelection::All);
        assert_eq!("".parse::<CameraSelection>().unwrap(), CameraSelection::All);
        assert_eq!(
            " a , b,,".parse::<CameraSelection>().unwrap(),
            CameraSelection::Ids(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_apply_keeps_server_order_and_reports_unknown() {
        let selection = CameraSelection::Ids(vec!["c".into(), "a".into(), "zz".into()]);
        let (selected, unknown) = selection.apply(vec![cam("a"), cam("b"), cam("c")]);
        let ids: Vec<_> = selected.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!(unknown, ["zz"]);
    }

    #[test]
    fn test_apply_all() {
        let (selected, unknown) = CameraSelection::All.apply(vec![cam("a"), cam("b")]);
        assert_eq!(selected.len(), 2);
        assert!(unknown.is_empty());
    }
}
