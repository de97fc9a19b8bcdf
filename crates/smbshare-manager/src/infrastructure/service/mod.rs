//! Service control adapters implementing
//! [`crate::application::reconcile_service::ServiceReconciler`].
//!
//! - **`systemd`** – [`systemd::SystemdReconciler`] drives `systemctl`.
//! - **`mock`** – [`mock::MockReconciler`] records calls in memory; used by
//!   integration tests and anywhere a real service must not be touched.

pub mod mock;
pub mod systemd;
