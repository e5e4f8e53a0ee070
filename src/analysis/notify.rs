//! Change notifications for methods whose analysis completed.

use std::sync::mpsc::Sender;

use crate::metadata::identity::MethodId;

/// Receiver of completion notifications.
///
/// Called on the thread running the analysis pass, with the analysis lock held. An
/// implementation must not start another analysis from inside the callback.
pub trait ChangeSink: Send + Sync {
    /// `methods` completed analysis since the previous notification.
    fn methods_completed(&self, methods: &[MethodId]);
}

impl<F> ChangeSink for F
where
    F: Fn(&[MethodId]) + Send + Sync,
{
    fn methods_completed(&self, methods: &[MethodId]) {
        self(methods);
    }
}

impl ChangeSink for Sender<Vec<MethodId>> {
    fn methods_completed(&self, methods: &[MethodId]) {
        if self.send(methods.to_vec()).is_err() {
            log::debug!("change receiver dropped, {} notifications lost", methods.len());
        }
    }
}

/// Coalesces completed methods into batches.
#[derive(Debug, Default)]
pub(crate) struct Notifier {
    pending: Vec<MethodId>,
}

impl Notifier {
    /// Records a completed method, flushing once `batch_size` are pending.
    pub(crate) fn push(&mut self, id: MethodId, batch_size: usize, sink: Option<&dyn ChangeSink>) {
        self.pending.push(id);
        if self.pending.len() >= batch_size {
            self.flush(sink);
        }
    }

    /// Delivers everything pending, if anything.
    pub(crate) fn flush(&mut self, sink: Option<&dyn ChangeSink>) {
        if self.pending.is_empty() {
            return;
        }
        if let Some(sink) = sink {
            sink.methods_completed(&self.pending);
        }
        self.pending.clear();
    }

    /// Drops pending notifications without delivering them.
    pub(crate) fn discard(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{mpsc, Mutex};

    use super::*;
    use crate::test::method_id;

    #[test]
    fn test_batches_at_threshold() {
        let batches = Mutex::new(Vec::new());
        let sink = |ids: &[MethodId]| batches.lock().unwrap().push(ids.len());

        let mut notifier = Notifier::default();
        for row in 1..=5 {
            notifier.push(method_id(row), 2, Some(&sink));
        }
        notifier.flush(Some(&sink));
        notifier.flush(Some(&sink));

        assert_eq!(*batches.lock().unwrap(), vec![2, 2, 1]);
    }

    #[test]
    fn test_channel_sink() {
        let (tx, rx) = mpsc::channel();
        let mut notifier = Notifier::default();
        notifier.push(method_id(7), 10, Some(&tx));
        notifier.flush(Some(&tx));

        assert_eq!(rx.recv().unwrap(), vec![method_id(7)]);
    }

    #[test]
    fn test_discard() {
        let (tx, rx) = mpsc::channel::<Vec<MethodId>>();
        let mut notifier = Notifier::default();
        notifier.push(method_id(1), 10, Some(&tx));
        notifier.discard();
        notifier.flush(Some(&tx));
        drop(tx);
        assert!(rx.recv().is_err());
    }
}
