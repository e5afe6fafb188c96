use serde::Deserialize;

use crate::models::ListCursor;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListClientsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ListClientsQuery {
    /// Missing page means the first page; missing page size means the
    /// server default.
    pub fn cursor(&self) -> ListCursor {
        ListCursor {
            page: self.page.unwrap_or(1),
            per_page: self.per_page.unwrap_or(0),
        }
    }
}
