use super::domain::{AttendanceRecord, EventDefinition, EventId, StudentId};

/// Attendance store. Implementations enforce one record per (student, event).
pub trait AttendanceRepository: Send + Sync {
    fn insert(&self, record: AttendanceRecord) -> Result<AttendanceRecord, RepositoryError>;
    fn update(&self, record: AttendanceRecord) -> Result<(), RepositoryError>;
    fn fetch(
        &self,
        event_id: &EventId,
        student_id: &StudentId,
    ) -> Result<Option<AttendanceRecord>, RepositoryError>;
    fn for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<AttendanceRecord>, RepositoryError>;
    fn for_event(&self, event_id: &EventId) -> Result<Vec<AttendanceRecord>, RepositoryError>;
}

/// Event store holding schedules and geofence settings.
pub trait EventRepository: Send + Sync {
    fn upsert(&self, event: EventDefinition) -> Result<EventDefinition, RepositoryError>;
    fn fetch(&self, event_id: &EventId) -> Result<Option<EventDefinition>, RepositoryError>;
    fn remove(&self, event_id: &EventId) -> Result<Option<EventDefinition>, RepositoryError>;
    fn all(&self) -> Result<Vec<EventDefinition>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
