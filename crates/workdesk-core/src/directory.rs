use anyhow::Result;
use workdesk_db::Database;
use workdesk_types::models::{Account, Role};

/// Read-only view of the portal's accounts.
pub trait AccountDirectory: Send + Sync {
    fn account(&self, id: i64) -> Result<Option<Account>>;

    /// Current members of `role`, ordered by id.
    fn accounts_with_role(&self, role: Role) -> Result<Vec<Account>>;
}

impl AccountDirectory for Database {
    fn account(&self, id: i64) -> Result<Option<Account>> {
        self.get_account(id)?.map(|row| row.into_model()).transpose()
    }

    fn accounts_with_role(&self, role: Role) -> Result<Vec<Account>> {
        self.get_accounts_by_role(role.as_str())?
            .into_iter()
            .map(|row| row.into_model())
            .collect()
    }
}
