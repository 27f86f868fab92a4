//! Endpoint paths, relative to the configured base URL.

use crate::model::ticket::TicketId;

pub const CHOICES: &str = "ticket/ticket/choices/";
pub const REPORTS: &str = "ticket/reports/";
pub const TICKET_COMMENTS: &str = "ticket/ticket-comments/";
pub const RESOLUTIONS: &str = "resolution/resolutions/";
pub const RESOLUTION_CHOICES: &str = "resolution/resolution-choices/";

#[must_use]
pub fn ticket(id: &TicketId) -> String {
    format!("ticket/tickets/{id}/")
}

#[must_use]
pub fn resolution(id: &TicketId) -> String {
    format!("{RESOLUTIONS}{id}/")
}

#[must_use]
pub fn personal_details(user_id: i64) -> String {
    format!("details/personal_details/{user_id}/")
}

/// Path plus query for endpoints filtered by ticket.
#[must_use]
pub fn reports_for(id: &TicketId) -> String {
    format!("{REPORTS}?ticket={id}")
}

#[must_use]
pub fn attachments_for(id: &TicketId) -> String {
    format!("ticket/attachments/?ticket={id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_match_server_routes() {
        let id = TicketId::new("SRIA48213307");
        assert_eq!(ticket(&id), "ticket/tickets/SRIA48213307/");
        assert_eq!(resolution(&id), "resolution/resolutions/SRIA48213307/");
        assert_eq!(reports_for(&id), "ticket/reports/?ticket=SRIA48213307");
        assert_eq!(attachments_for(&id), "ticket/attachments/?ticket=SRIA48213307");
        assert_eq!(personal_details(7), "details/personal_details/7/");
    }
}
