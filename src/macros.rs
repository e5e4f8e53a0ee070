/// Helper macro for locking items, mapping a poisoned mutex to [`crate::Error::LockError`]
///
/// ```rust, ignore
///  let mut data = lock!(my_mutex)?;
///  data.some_field = 42;
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().map_err(|_| crate::Error::LockError)
    };
}

/// Helper macro for reading locked items
///
/// ```rust, ignore
///  let data = read_lock!(entry.data)?;
///  println!("{}", data.called_methods.len());
/// ```
macro_rules! read_lock {
    ($rwlock:expr) => {
        $rwlock.read().map_err(|_| crate::Error::LockError)
    };
}

/// Helper macro for writing to locked items
///
/// ```rust, ignore
///  let mut data = write_lock!(entry.data)?;
///  data.called_methods.clear();
/// ```
macro_rules! write_lock {
    ($rwlock:expr) => {
        $rwlock.write().map_err(|_| crate::Error::LockError)
    };
}

/// Helper macro for reading locked items through a closure
///
/// ```rust, ignore
///  let count = with_read!(entry.data, |data| data.unhandled.len())?;
/// ```
macro_rules! with_read {
    ($rwlock:expr, $closure:expr) => {{
        match $rwlock.read() {
            Ok(guard) => Ok($closure(&*guard)),
            Err(_) => Err(crate::Error::LockError),
        }
    }};
}
