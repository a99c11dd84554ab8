//! One open upload form: coordinator plus the expiry projection it relies on.

use std::sync::Arc;

use timedrop_clock::{
    Clock, DeadlineAdapter, ExpiryField, ProjectionTask, SharedExpiryField, ViewerZone, lock_field,
};
use timedrop_ui::NotificationSurface;
use timedrop_upload::UploadTransport;
use tracing::debug;

use crate::AppError;
use crate::config::UploadConfig;
use crate::coordinator::{Collaborators, FormBinding, Navigator, UploadCoordinator};

/// Form session; the projection task lives exactly as long as the session.
pub struct UploadSession {
    coordinator: UploadCoordinator,
    notifications: Arc<NotificationSurface>,
    deadline: Arc<DeadlineAdapter>,
    expiry_field: SharedExpiryField,
    projection: ProjectionTask,
}

impl UploadSession {
    /// Opens a form: captures expiry bounds, fills the expiry field and
    /// starts the projection.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] when the configured bounds cannot be
    /// placed on the calendar.
    pub fn open(
        config: &UploadConfig,
        clock: Arc<dyn Clock>,
        zone: Arc<dyn ViewerZone>,
        transport: Arc<dyn UploadTransport>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, AppError> {
        let bound = config.expiry_bound(clock.now())?;
        let deadline = Arc::new(DeadlineAdapter::capture(clock, zone, &bound));
        let expiry_field = SharedExpiryField::default();
        deadline.initialize(&mut lock_field(&expiry_field));
        let projection = deadline.spawn_projection(Arc::clone(&expiry_field));

        let notifications = Arc::new(NotificationSurface::new());
        let coordinator = UploadCoordinator::new(
            FormBinding {
                file_field: config.file_field.clone(),
                csrf_token: config.connection.csrf_token.clone(),
                rules: config.rules,
            },
            Collaborators {
                notifications: Arc::clone(&notifications),
                deadline: Arc::clone(&deadline),
                expiry_field: Arc::clone(&expiry_field),
                transport,
                navigator,
            },
        );
        debug!("upload session opened");

        Ok(Self {
            coordinator,
            notifications,
            deadline,
            expiry_field,
            projection,
        })
    }

    /// Coordinator of this form.
    pub fn coordinator(&self) -> &UploadCoordinator {
        &self.coordinator
    }

    /// Mutable coordinator of this form.
    pub fn coordinator_mut(&mut self) -> &mut UploadCoordinator {
        &mut self.coordinator
    }

    /// Notification surface views subscribe to.
    pub fn notifications(&self) -> Arc<NotificationSurface> {
        Arc::clone(&self.notifications)
    }

    /// Deadline adapter of this form.
    pub fn deadline(&self) -> &DeadlineAdapter {
        &self.deadline
    }

    /// Snapshot of the expiry input.
    pub fn expiry_field(&self) -> ExpiryField {
        lock_field(&self.expiry_field).clone()
    }

    /// Live expiry input, kept current by the projection.
    pub fn expiry_field_handle(&self) -> SharedExpiryField {
        Arc::clone(&self.expiry_field)
    }

    /// Returns `true` while the expiry projection is running.
    pub fn projection_running(&self) -> bool {
        self.projection.is_running()
    }

    /// Tears the form down and stops the projection.
    pub fn close(self) {
        let Self { projection, .. } = self;
        projection.cancel();
        debug!("upload session closed");
    }
}
