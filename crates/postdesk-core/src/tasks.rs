//! Single-flight tracking for user actions.
//!
//! Each [`TaskKind`] may have at most one invocation in flight. Starting a
//! kind that is already running returns `None`; the returned [`TaskGuard`]
//! releases the slot on drop, including on early return or panic.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    LoginEmail,
    LoginFederated,
    Logout,
    PostList,
    PostCreate,
    PostEditFetch,
    PostEditSubmit,
    PostDelete,
    ContactSubmit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

/// Lifecycle of one kind.
#[derive(Debug, Default, Clone)]
pub struct TaskState {
    pub active: Option<TaskId>,
}

impl TaskState {
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    fn finish_if_active(&mut self, id: TaskId) -> bool {
        let ok = self.active == Some(id);
        if ok {
            self.active = None;
        }
        ok
    }
}

#[derive(Debug, Default)]
struct Slots {
    next: u64,
    login_email: TaskState,
    login_federated: TaskState,
    logout: TaskState,
    post_list: TaskState,
    post_create: TaskState,
    post_edit_fetch: TaskState,
    post_edit_submit: TaskState,
    post_delete: TaskState,
    contact_submit: TaskState,
}

impl Slots {
    fn state_mut(&mut self, kind: TaskKind) -> &mut TaskState {
        match kind {
            TaskKind::LoginEmail => &mut self.login_email,
            TaskKind::LoginFederated => &mut self.login_federated,
            TaskKind::Logout => &mut self.logout,
            TaskKind::PostList => &mut self.post_list,
            TaskKind::PostCreate => &mut self.post_create,
            TaskKind::PostEditFetch => &mut self.post_edit_fetch,
            TaskKind::PostEditSubmit => &mut self.post_edit_submit,
            TaskKind::PostDelete => &mut self.post_delete,
            TaskKind::ContactSubmit => &mut self.contact_submit,
        }
    }
}

/// Shared in-flight table.
#[derive(Debug, Default, Clone)]
pub struct Tasks {
    slots: Arc<Mutex<Slots>>,
}

impl Tasks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims `kind`, or returns `None` if it is already in flight.
    pub fn try_start(&self, kind: TaskKind) -> Option<TaskGuard> {
        let mut slots = self.lock();
        let id = TaskId(slots.next);
        slots.next = slots.next.wrapping_add(1);

        let state = slots.state_mut(kind);
        if state.is_running() {
            tracing::debug!(?kind, "dropping duplicate action");
            return None;
        }
        state.active = Some(id);
        Some(TaskGuard {
            tasks: self.clone(),
            kind,
            id,
        })
    }

    pub fn is_running(&self, kind: TaskKind) -> bool {
        self.lock().state_mut(kind).is_running()
    }
}

/// Releases its slot when dropped.
#[derive(Debug)]
pub struct TaskGuard {
    tasks: Tasks,
    kind: TaskKind,
    id: TaskId,
}

impl TaskGuard {
    pub fn kind(&self) -> TaskKind {
        self.kind
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.tasks.lock().state_mut(self.kind).finish_if_active(self.id);
    }
}
