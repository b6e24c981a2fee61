//! Agency client database operations

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use dhub_common::db::models::AgencyClient;
use dhub_common::types::ClientStatus;
use dhub_common::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct NewClient {
    pub client_name: String,
    pub client_email: Option<String>,
    pub current_address: Option<String>,
    pub current_city: Option<String>,
    pub current_state: Option<String>,
    pub current_zip: Option<String>,
}

pub async fn insert_client(
    pool: &SqlitePool,
    agency_user_id: Uuid,
    new: NewClient,
) -> Result<AgencyClient> {
    let now = Utc::now();
    let client = AgencyClient {
        id: Uuid::new_v4(),
        agency_user_id,
        client_name: new.client_name,
        client_email: new.client_email,
        current_address: new.current_address,
        current_city: new.current_city,
        current_state: new.current_state,
        current_zip: new.current_zip,
        status: ClientStatus::Active.as_str().to_string(),
        letters_generated: 0,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO agency_clients (
            id, agency_user_id, client_name, client_email,
            current_address, current_city, current_state, current_zip,
            status, letters_generated, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(client.id.to_string())
    .bind(client.agency_user_id.to_string())
    .bind(&client.client_name)
    .bind(&client.client_email)
    .bind(&client.current_address)
    .bind(&client.current_city)
    .bind(&client.current_state)
    .bind(&client.current_zip)
    .bind(&client.status)
    .bind(client.letters_generated)
    .bind(client.created_at)
    .bind(client.updated_at)
    .execute(pool)
    .await?;

    Ok(client)
}

pub async fn get_client(
    pool: &SqlitePool,
    agency_user_id: Uuid,
    client_id: Uuid,
) -> Result<AgencyClient> {
    sqlx::query_as::<_, AgencyClient>(
        "SELECT * FROM agency_clients WHERE id = ? AND agency_user_id = ?",
    )
    .bind(client_id.to_string())
    .bind(agency_user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("agency client {}", client_id)))
}

pub async fn list_clients(pool: &SqlitePool, agency_user_id: Uuid) -> Result<Vec<AgencyClient>> {
    let clients = sqlx::query_as::<_, AgencyClient>(
        "SELECT * FROM agency_clients WHERE agency_user_id = ? ORDER BY created_at",
    )
    .bind(agency_user_id.to_string())
    .fetch_all(pool)
    .await?;
    Ok(clients)
}

/// Total client rows for an agency. Archived clients still count toward the
/// capacity limit.
pub async fn count_clients(pool: &SqlitePool, agency_user_id: Uuid) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM agency_clients WHERE agency_user_id = ?")
            .bind(agency_user_id.to_string())
            .fetch_one(pool)
            .await?;
    Ok(count)
}

pub async fn set_client_status(
    pool: &SqlitePool,
    agency_user_id: Uuid,
    client_id: Uuid,
    status: ClientStatus,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE agency_clients SET status = ?, updated_at = ? WHERE id = ? AND agency_user_id = ?",
    )
    .bind(status.as_str())
    .bind(Utc::now())
    .bind(client_id.to_string())
    .bind(agency_user_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("agency client {}", client_id)));
    }
    Ok(())
}
