use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

/// Fixed reply returned on the escalated path. Asks for an account identifier
/// and a callback window; the generation service is never consulted here.
pub const ESCALATION_RESPONSE: &str = "I'm escalating this conversation to a human agent due to \
     negative sentiment. Please share your account email or order ID and the best time window \
     for a callback.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Technical,
    Billing,
    General,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Technical => "Technical",
            Self::Billing => "Billing",
            Self::General => "General",
        }
    }
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Neutral => "Neutral",
            Self::Negative => "Negative",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Technical" => Ok(Self::Technical),
            "Billing" => Ok(Self::Billing),
            "General" => Ok(Self::General),
            other => Err(PipelineError::Classification(format!(
                "category `{other}` is outside Technical|Billing|General"
            ))),
        }
    }
}

impl std::str::FromStr for Sentiment {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Positive" => Ok(Self::Positive),
            "Neutral" => Ok(Self::Neutral),
            "Negative" => Ok(Self::Negative),
            other => Err(PipelineError::Classification(format!(
                "sentiment `{other}` is outside Positive|Neutral|Negative"
            ))),
        }
    }
}

/// Output of the classification collaborator: both fields are required and
/// must come from the fixed enumerations, so an invalid pair is
/// unrepresentable past the parse boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub sentiment: Sentiment,
}

/// Which handler instruction the generation collaborator should use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    Technical,
    Billing,
    General,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Billing => "billing",
            Self::General => "general",
        }
    }
}

/// Routing outcome for a classified query. One tagged case per handler plus
/// the escalated short-circuit; the `Routed -> Done` step matches on this
/// exhaustively, so an unhandled route cannot compile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Technical,
    Billing,
    General,
    Escalated,
}

impl Route {
    /// Deterministic routing policy. Sentiment takes priority over category:
    /// negative sentiment escalates no matter what the category says.
    pub fn for_classification(classification: &Classification) -> Self {
        if classification.sentiment == Sentiment::Negative {
            return Self::Escalated;
        }
        match classification.category {
            Category::Technical => Self::Technical,
            Category::Billing => Self::Billing,
            Category::General => Self::General,
        }
    }

    /// The generation handler for this route, or `None` on the escalated
    /// path, which never reaches the generation service.
    pub fn response_kind(&self) -> Option<ResponseKind> {
        match self {
            Self::Technical => Some(ResponseKind::Technical),
            Self::Billing => Some(ResponseKind::Billing),
            Self::General => Some(ResponseKind::General),
            Self::Escalated => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Category, Classification, PipelineError, ResponseKind, Route, Sentiment};

    fn classified(category: Category, sentiment: Sentiment) -> Classification {
        Classification { category, sentiment }
    }

    #[test]
    fn negative_sentiment_escalates_regardless_of_category() {
        for category in [Category::Technical, Category::Billing, Category::General] {
            let route = Route::for_classification(&classified(category, Sentiment::Negative));
            assert_eq!(route, Route::Escalated);
            assert_eq!(route.response_kind(), None);
        }
    }

    #[test]
    fn non_negative_sentiment_routes_by_category() {
        for sentiment in [Sentiment::Positive, Sentiment::Neutral] {
            assert_eq!(
                Route::for_classification(&classified(Category::Technical, sentiment)),
                Route::Technical
            );
            assert_eq!(
                Route::for_classification(&classified(Category::Billing, sentiment)),
                Route::Billing
            );
            assert_eq!(
                Route::for_classification(&classified(Category::General, sentiment)),
                Route::General
            );
        }
    }

    #[test]
    fn routes_map_to_their_handlers() {
        assert_eq!(Route::Technical.response_kind(), Some(ResponseKind::Technical));
        assert_eq!(Route::Billing.response_kind(), Some(ResponseKind::Billing));
        assert_eq!(Route::General.response_kind(), Some(ResponseKind::General));
    }

    #[test]
    fn category_parsing_is_strict() {
        assert_eq!("Billing".parse::<Category>().expect("valid"), Category::Billing);
        assert_eq!(" Technical ".parse::<Category>().expect("trimmed"), Category::Technical);

        let error = "billing".parse::<Category>().expect_err("case is significant");
        assert!(matches!(error, PipelineError::Classification(_)));
    }

    #[test]
    fn sentiment_parsing_is_strict() {
        assert_eq!("Negative".parse::<Sentiment>().expect("valid"), Sentiment::Negative);

        let error = "angry".parse::<Sentiment>().expect_err("outside enumeration");
        assert!(matches!(error, PipelineError::Classification(_)));
    }

    #[test]
    fn escalation_response_asks_for_account_and_callback_window() {
        assert!(super::ESCALATION_RESPONSE.contains("account"));
        assert!(super::ESCALATION_RESPONSE.contains("callback"));
    }
}
