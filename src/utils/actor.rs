use crate::types::{SarError, SarResult};
use std::fmt;
use std::sync::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

type Job<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Handle to an instance owned by a task on a tokio runtime. Clones share
/// the same actor.
pub struct RemoteActor<T> {
    jobs: mpsc::UnboundedSender<Job<T>>,
}

impl<T> Clone for RemoteActor<T> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
        }
    }
}

impl<T: Send + 'static> RemoteActor<T> {
    fn spawn(mut instance: T, handle: &Handle) -> Self {
        let (jobs, mut queue) = mpsc::unbounded_channel::<Job<T>>();
        handle.spawn(async move {
            while let Some(job) = queue.recv().await {
                job(&mut instance);
            }
            log::debug!("Actor for {} stopped", std::any::type_name::<T>());
        });
        Self { jobs }
    }

    fn call<R, F>(&self, f: F) -> SarResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> R + Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        let job: Job<T> = Box::new(move |instance: &mut T| {
            // the caller may have given up waiting
            let _ = reply.send(f(instance));
        });
        self.jobs
            .send(job)
            .map_err(|_| SarError::Processing(actor_gone::<T>()))?;
        result
            .blocking_recv()
            .map_err(|_| SarError::Processing(actor_gone::<T>()))
    }
}

fn actor_gone<T>() -> String {
    format!("Actor for {} is no longer running", std::any::type_name::<T>())
}

/// Uniform blocking access to an instance that either lives locally or is
/// owned by an actor task. Remote calls wait for their result, so callers
/// use both variants the same way.
///
/// Remote calls block the calling thread and must not be issued from
/// inside the runtime's async context.
pub enum BlockingActorProxy<T> {
    Local(Mutex<T>),
    Remote(RemoteActor<T>),
}

impl<T: Send + 'static> BlockingActorProxy<T> {
    /// Remote when a runtime handle is given, local otherwise
    pub fn new(instance: T, runtime: Option<Handle>) -> Self {
        match runtime {
            Some(handle) => {
                log::debug!("Submitting new actor for {}", std::any::type_name::<T>());
                Self::spawn(instance, &handle)
            }
            None => {
                log::info!(
                    "BlockingActorProxy: Transparent proxy for {}",
                    std::any::type_name::<T>()
                );
                Self::local(instance)
            }
        }
    }

    /// Pick up the ambient tokio runtime if there is one
    pub fn from_context(instance: T) -> Self {
        Self::new(instance, Handle::try_current().ok())
    }

    pub fn local(instance: T) -> Self {
        Self::Local(Mutex::new(instance))
    }

    pub fn spawn(instance: T, handle: &Handle) -> Self {
        Self::Remote(RemoteActor::spawn(instance, handle))
    }

    /// Proxy over an already running actor
    pub fn attach(actor: RemoteActor<T>) -> Self {
        log::debug!("Reusing actor for {}", std::any::type_name::<T>());
        Self::Remote(actor)
    }

    /// Handle to the backing actor, if remote
    pub fn actor(&self) -> Option<RemoteActor<T>> {
        match self {
            Self::Remote(actor) => Some(actor.clone()),
            Self::Local(_) => None,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Run `f` against the proxied instance and return its result
    pub fn call<R, F>(&self, f: F) -> SarResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> R + Send + 'static,
    {
        match self {
            Self::Local(instance) => {
                let mut guard = instance
                    .lock()
                    .map_err(|_| SarError::Processing(actor_gone::<T>()))?;
                Ok(f(&mut *guard))
            }
            Self::Remote(actor) => actor.call(f),
        }
    }
}

impl<T> fmt::Debug for BlockingActorProxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<BlockingActorProxy: {}>", std::any::type_name::<T>())
    }
}
