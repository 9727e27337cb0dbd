//! Project repository.
//!
//! Projects only exist here to scope files to an organization.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{NewProject, ProjectRecord};
use super::pool::{DieselError, SqlitePool};
use super::util::{last_insert_id, now_timestamp};
use crate::models::Project;
use crate::schema::projects;

#[derive(Clone)]
pub struct ProjectRepository {
    pool: SqlitePool,
}

impl ProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an active project owned by `org_id`.
    pub async fn create(&self, org_id: i32, name: &str) -> Result<Project, DieselError> {
        let mut conn = self.pool.get().await?;
        let created_at = now_timestamp();

        diesel::insert_into(projects::table)
            .values(NewProject {
                org_id,
                name,
                is_active: 1,
                created_at: &created_at,
            })
            .execute(&mut conn)
            .await?;

        let id = last_insert_id(&mut conn).await?;

        projects::table
            .find(id)
            .select(ProjectRecord::as_select())
            .first(&mut conn)
            .await
            .map(Project::from)
    }

    /// Get a project if it belongs to `org_id`.
    pub async fn get_scoped(
        &self,
        org_id: i32,
        project_id: i32,
    ) -> Result<Option<Project>, DieselError> {
        let mut conn = self.pool.get().await?;

        projects::table
            .filter(projects::id.eq(project_id))
            .filter(projects::org_id.eq(org_id))
            .select(ProjectRecord::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map(|r| r.map(Project::from))
    }

    pub async fn list(&self, org_id: i32) -> Result<Vec<Project>, DieselError> {
        let mut conn = self.pool.get().await?;

        projects::table
            .filter(projects::org_id.eq(org_id))
            .order(projects::id.asc())
            .select(ProjectRecord::as_select())
            .load(&mut conn)
            .await
            .map(|records| records.into_iter().map(Project::from).collect())
    }
}
