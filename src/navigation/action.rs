use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A navigation call as written in the state map, e.g. `"navigateTo('tech')"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NavigationAction {
    NavigateTo(String),
    NavigateNext,
    NavigatePrevious,
    CycleState,
    NavigateBack,
}

fn navigate_to_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^navigateTo\(\s*['"](.+?)['"]\s*\)$"#).expect("navigateTo pattern is valid")
    })
}

impl TryFrom<String> for NavigationAction {
    type Error = String;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        let trimmed = text.trim();
        if let Some(captures) = navigate_to_pattern().captures(trimmed) {
            return Ok(NavigationAction::NavigateTo(captures[1].to_string()));
        }
        match trimmed {
            "navigateNext()" => Ok(NavigationAction::NavigateNext),
            "navigatePrevious()" => Ok(NavigationAction::NavigatePrevious),
            "cycleState()" => Ok(NavigationAction::CycleState),
            "navigateBack()" => Ok(NavigationAction::NavigateBack),
            _ => Err(format!("unknown navigation action '{}'", text)),
        }
    }
}

impl From<NavigationAction> for String {
    fn from(action: NavigationAction) -> Self {
        action.to_string()
    }
}

impl fmt::Display for NavigationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationAction::NavigateTo(state) => write!(f, "navigateTo('{}')", state),
            NavigationAction::NavigateNext => f.write_str("navigateNext()"),
            NavigationAction::NavigatePrevious => f.write_str("navigatePrevious()"),
            NavigationAction::CycleState => f.write_str("cycleState()"),
            NavigationAction::NavigateBack => f.write_str("navigateBack()"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_calls() {
        let parse = |s: &str| NavigationAction::try_from(s.to_string());
        assert_eq!(parse("navigateTo('tech')"), Ok(NavigationAction::NavigateTo("tech".into())));
        assert_eq!(parse("navigateTo(\"media\")"), Ok(NavigationAction::NavigateTo("media".into())));
        assert_eq!(parse(" cycleState() "), Ok(NavigationAction::CycleState));
        assert_eq!(parse("navigateBack()"), Ok(NavigationAction::NavigateBack));
        assert!(parse("navigateTo()").is_err());
        assert!(parse("jump()").is_err());
    }

    #[test]
    fn display_round_trips_through_json() {
        let action = NavigationAction::NavigateTo("innovation".into());
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, r#""navigateTo('innovation')""#);
        let back: NavigationAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }
}
