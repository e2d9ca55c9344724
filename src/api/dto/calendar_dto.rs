//! Calendar DTOs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::SessionResponse;
use crate::service::CalendarView;

/// Query parameters for `GET /calendar`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CalendarQuery {
    /// First day of the range, inclusive.
    pub start_date: NaiveDate,
    /// Last day of the range, inclusive.
    pub end_date: NaiveDate,
}

/// Response body for `GET /calendar`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CalendarResponse {
    /// Distinct days with at least one occupying session.
    pub dates: Vec<NaiveDate>,
    /// Occupying sessions, ordered by date.
    pub sessions: Vec<SessionResponse>,
}

impl From<CalendarView> for CalendarResponse {
    fn from(view: CalendarView) -> Self {
        Self {
            dates: view.dates,
            sessions: view.sessions.into_iter().map(SessionResponse::from).collect(),
        }
    }
}
