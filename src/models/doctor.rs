use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A doctor profile. `user_id` links the login account acting for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub hospital_id: Uuid,
    pub specialty_id: Option<Uuid>,
    pub name: String,
}
