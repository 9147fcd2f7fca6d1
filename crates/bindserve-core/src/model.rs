use std::sync::Arc;
use std::time::{Duration, Instant};

use bindserve_error::Result;

use crate::{ComputeDevice, ModalityEmbeddings, ModelInput};

/// A loaded embedding model.
///
/// Implementations must return, for every modality present in the input, one
/// vector per item in input order. Calls are synchronous; the host decides
/// how many run at once.
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, input: &ModelInput) -> Result<ModalityEmbeddings>;

    /// Width of every returned vector.
    fn embedding_dim(&self) -> usize;

    fn device(&self) -> ComputeDevice;
}

impl<M: EmbeddingModel + ?Sized> EmbeddingModel for Arc<M> {
    fn embed(&self, input: &ModelInput) -> Result<ModalityEmbeddings> {
        (**self).embed(input)
    }

    fn embedding_dim(&self) -> usize {
        (**self).embedding_dim()
    }

    fn device(&self) -> ComputeDevice {
        (**self).device()
    }
}

impl<M: EmbeddingModel + ?Sized> EmbeddingModel for Box<M> {
    fn embed(&self, input: &ModelInput) -> Result<ModalityEmbeddings> {
        (**self).embed(input)
    }

    fn embedding_dim(&self) -> usize {
        (**self).embedding_dim()
    }

    fn device(&self) -> ComputeDevice {
        (**self).device()
    }
}

/// The model bound to its device, created once at startup and shared
/// read-only afterwards.
#[derive(Debug)]
pub struct ModelHandle<M> {
    model: M,
    device: ComputeDevice,
    load_time: Duration,
}

impl<M: EmbeddingModel> ModelHandle<M> {
    pub fn new(model: M) -> Self {
        Self::with_load_time(model, Duration::ZERO)
    }

    pub fn with_load_time(model: M, load_time: Duration) -> Self {
        let device = model.device();
        Self {
            model,
            device,
            load_time,
        }
    }

    /// Run `build` and record how long it took.
    pub fn timed<E>(build: impl FnOnce() -> std::result::Result<M, E>) -> std::result::Result<Self, E> {
        let start = Instant::now();
        let model = build()?;
        Ok(Self::with_load_time(model, start.elapsed()))
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn device(&self) -> ComputeDevice {
        self.device
    }

    pub fn embedding_dim(&self) -> usize {
        self.model.embedding_dim()
    }

    pub fn load_time(&self) -> Duration {
        self.load_time
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Modality;

    #[derive(Debug)]
    struct Fixed;

    impl EmbeddingModel for Fixed {
        fn embed(&self, input: &ModelInput) -> Result<ModalityEmbeddings> {
            Ok(input
                .batches()
                .map(|b| (b.modality(), vec![vec![1.0, 0.0]; b.len()]))
                .collect())
        }

        fn embedding_dim(&self) -> usize {
            2
        }

        fn device(&self) -> ComputeDevice {
            ComputeDevice::Cuda { ordinal: 0 }
        }
    }

    #[test]
    fn handle_records_model_device() {
        let handle = ModelHandle::new(Fixed);
        assert_eq!(handle.device(), ComputeDevice::Cuda { ordinal: 0 });
        assert_eq!(handle.embedding_dim(), 2);
    }

    #[test]
    fn timed_propagates_build_errors() {
        let err = ModelHandle::<Fixed>::timed(|| Err("no weights")).unwrap_err();
        assert_eq!(err, "no weights");
    }

    #[test]
    fn shared_handle_is_usable_across_threads() {
        let handle = ModelHandle::new(Arc::new(Fixed)).into_shared();
        let worker = {
            let handle = Arc::clone(&handle);
            std::thread::spawn(move || {
                handle
                    .model()
                    .embed(&ModelInput::from_texts(["a", "b"]))
                    .map(|out| out.get(Modality::Text).map(<[_]>::len))
            })
        };
        assert_eq!(worker.join().unwrap().unwrap(), Some(2));
    }
}
