//! Adapters from typed Rust functions to the uniform binding contract.
//!
//! Every bound function is stored as a [`BindingFn`]: it takes the encoded
//! argument list sent by the page and returns a future of
//! [`BindingResult`]. Typed closures are converted through
//! [`SyncBinding`] (plain functions) or [`AsyncBinding`] (functions returning
//! a future), implemented for up to eight arguments.
//!
//! # Return Types
//!
//! | Rust return | Page promise |
//! |-------------|--------------|
//! | `()` | resolves with `null` |
//! | `T` (serializable value) | resolves with `T` |
//! | `Result<T, E>` | resolves with `T`, or rejects with `E`'s message |
//! | `Result<(), E>` | resolves with `null`, or rejects |
//! | [`Json<T>`] | resolves with any `T: Serialize` |
//!
//! # Example
//!
//! ```ignore
//! session.bind("add", |a: i64, b: i64| a + b).await?;
//! session.bind_async("fetch", |url: String| async move { fetch(&url).await }).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

// ============================================================================
// Types
// ============================================================================

/// Outcome of one binding invocation.
pub type BindingResult = std::result::Result<Value, BindingError>;

/// Uniform shape of every bound function.
pub type BindingFn = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, BindingResult> + Send + Sync>;

/// Wraps an async closure over the raw argument list as a [`BindingFn`].
///
/// Useful for variadic bindings that inspect the arguments themselves.
pub fn binding_fn<F, Fut>(f: F) -> BindingFn
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BindingResult> + Send + 'static,
{
    Arc::new(move |args| -> BoxFuture<'static, BindingResult> { Box::pin(f(args)) })
}

// ============================================================================
// BindingError
// ============================================================================

/// Failure reported back to the page as a rejected promise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BindingError {
    message: String,
}

impl BindingError {
    /// Creates an error with the message the page will see.
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The page passed the wrong number of arguments.
    pub(crate) fn arguments_mismatch(expected: usize, got: usize) -> Self {
        tracing::debug!(expected, got, "Binding arguments mismatch");
        Self::new("function arguments mismatch")
    }

    /// An argument could not be decoded into the parameter type.
    pub(crate) fn invalid_argument(index: usize, err: serde_json::Error) -> Self {
        Self::new(format!("invalid argument {index}: {err}"))
    }

    /// The bound function panicked.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self::new(format!("binding panicked: {detail}"))
    }
}

// ============================================================================
// IntoBindingResult
// ============================================================================

/// Conversion of a bound function's return value into a [`BindingResult`].
pub trait IntoBindingResult {
    /// Performs the conversion.
    fn into_binding_result(self) -> BindingResult;
}

impl IntoBindingResult for () {
    fn into_binding_result(self) -> BindingResult {
        Ok(Value::Null)
    }
}

impl<T, E> IntoBindingResult for Result<T, E>
where
    T: Serialize,
    E: fmt::Display,
{
    fn into_binding_result(self) -> BindingResult {
        match self {
            Ok(value) => to_value(&value),
            Err(err) => Err(BindingError::new(err.to_string())),
        }
    }
}

/// Serializable return value wrapper for types without a direct impl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoBindingResult for Json<T> {
    fn into_binding_result(self) -> BindingResult {
        to_value(&self.0)
    }
}

impl<T: Serialize> IntoBindingResult for Option<T> {
    fn into_binding_result(self) -> BindingResult {
        to_value(&self)
    }
}

impl<T: Serialize> IntoBindingResult for Vec<T> {
    fn into_binding_result(self) -> BindingResult {
        to_value(&self)
    }
}

impl<T: Serialize, S> IntoBindingResult for HashMap<String, T, S>
where
    S: std::hash::BuildHasher,
{
    fn into_binding_result(self) -> BindingResult {
        to_value(&self)
    }
}

impl<T: Serialize> IntoBindingResult for BTreeMap<String, T> {
    fn into_binding_result(self) -> BindingResult {
        to_value(&self)
    }
}

macro_rules! impl_into_binding_result {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoBindingResult for $ty {
                fn into_binding_result(self) -> BindingResult {
                    to_value(&self)
                }
            }
        )*
    };
}

impl_into_binding_result!(
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    String,
    &'static str,
    Value,
);

fn to_value<T: Serialize + ?Sized>(value: &T) -> BindingResult {
    serde_json::to_value(value).map_err(|e| BindingError::new(e.to_string()))
}

// ============================================================================
// Argument Decoding
// ============================================================================

/// Checks the argument count before anything is decoded.
fn check_arity(args: &[Value], expected: usize) -> Result<(), BindingError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(BindingError::arguments_mismatch(expected, args.len()))
    }
}

/// Decodes the next argument slot.
fn decode_next<A: DeserializeOwned>(
    args: &mut std::iter::Enumerate<std::vec::IntoIter<Value>>,
) -> Result<A, BindingError> {
    let (index, value) = args.next().unwrap_or_default();
    serde_json::from_value(value).map_err(|e| BindingError::invalid_argument(index, e))
}

// ============================================================================
// SyncBinding / AsyncBinding
// ============================================================================

/// A plain function usable as a binding.
///
/// `Args` is a tuple of the parameter types and only guides inference.
pub trait SyncBinding<Args>: Send + Sync + 'static {
    /// Erases the function into a [`BindingFn`].
    fn into_binding_fn(self) -> BindingFn;
}

/// A function returning a future, usable as a binding.
pub trait AsyncBinding<Args>: Send + Sync + 'static {
    /// Erases the function into a [`BindingFn`].
    fn into_binding_fn(self) -> BindingFn;
}

macro_rules! impl_bindings {
    ($count:expr; $($arg:ident),*) => {
        impl<F, R, $($arg,)*> SyncBinding<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: IntoBindingResult,
            $($arg: DeserializeOwned + Send + 'static,)*
        {
            #[allow(unused_mut, unused_variables)]
            fn into_binding_fn(self) -> BindingFn {
                let f = Arc::new(self);
                Arc::new(move |args: Vec<Value>| -> BoxFuture<'static, BindingResult> {
                    let f = Arc::clone(&f);
                    Box::pin(async move {
                        check_arity(&args, $count)?;
                        let mut args = args.into_iter().enumerate();
                        f($(decode_next::<$arg>(&mut args)?),*).into_binding_result()
                    })
                })
            }
        }

        impl<F, Fut, R, $($arg,)*> AsyncBinding<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoBindingResult,
            $($arg: DeserializeOwned + Send + 'static,)*
        {
            #[allow(unused_mut, unused_variables)]
            fn into_binding_fn(self) -> BindingFn {
                let f = Arc::new(self);
                Arc::new(move |args: Vec<Value>| -> BoxFuture<'static, BindingResult> {
                    let f = Arc::clone(&f);
                    Box::pin(async move {
                        check_arity(&args, $count)?;
                        let mut args = args.into_iter().enumerate();
                        let future = f($(decode_next::<$arg>(&mut args)?),*);
                        future.await.into_binding_result()
                    })
                })
            }
        }
    };
}

impl_bindings!(0;);
impl_bindings!(1; A1);
impl_bindings!(2; A1, A2);
impl_bindings!(3; A1, A2, A3);
impl_bindings!(4; A1, A2, A3, A4);
impl_bindings!(5; A1, A2, A3, A4, A5);
impl_bindings!(6; A1, A2, A3, A4, A5, A6);
impl_bindings!(7; A1, A2, A3, A4, A5, A6, A7);
impl_bindings!(8; A1, A2, A3, A4, A5, A6, A7, A8);

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn sync<Args, F: SyncBinding<Args>>(f: F) -> BindingFn {
        f.into_binding_fn()
    }

    fn asynchronous<Args, F: AsyncBinding<Args>>(f: F) -> BindingFn {
        f.into_binding_fn()
    }

    #[tokio::test]
    async fn test_two_argument_value() {
        let add = sync(|a: i64, b: i64| a + b);
        assert_eq!(add(vec![json!(1), json!(2)]).await, Ok(json!(3)));
    }

    #[tokio::test]
    async fn test_zero_argument_unit() {
        let noop = sync(|| ());
        assert_eq!(noop(vec![]).await, Ok(Value::Null));
    }

    #[tokio::test]
    async fn test_arity_mismatch_does_not_run() {
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let f = sync(move |_a: i64| {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        let err = f(vec![json!(1), json!(2)]).await.unwrap_err();
        assert_eq!(err.message(), "function arguments mismatch");
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_decode_failure() {
        let f = sync(|a: i64| a);
        let err = f(vec![json!("not a number")]).await.unwrap_err();
        assert!(err.message().starts_with("invalid argument 0"));
    }

    #[tokio::test]
    async fn test_result_ok_and_err() {
        let div = sync(|a: f64, b: f64| {
            if b == 0.0 {
                Err("division by zero")
            } else {
                Ok(a / b)
            }
        });

        assert_eq!(div(vec![json!(6.0), json!(3.0)]).await, Ok(json!(2.0)));
        let err = div(vec![json!(1.0), json!(0.0)]).await.unwrap_err();
        assert_eq!(err.message(), "division by zero");
    }

    #[tokio::test]
    async fn test_error_only_result() {
        let check = sync(|ok: bool| if ok { Ok(()) } else { Err("nope".to_string()) });

        assert_eq!(check(vec![json!(true)]).await, Ok(Value::Null));
        assert_eq!(
            check(vec![json!(false)]).await,
            Err(BindingError::new("nope"))
        );
    }

    #[tokio::test]
    async fn test_struct_arguments_and_json_return() {
        #[derive(Deserialize)]
        struct Point {
            x: i32,
            y: i32,
        }

        #[derive(Serialize)]
        struct Sum {
            total: i32,
        }

        let f = sync(|p: Point| Json(Sum { total: p.x + p.y }));
        assert_eq!(
            f(vec![json!({"x": 2, "y": 5})]).await,
            Ok(json!({"total": 7}))
        );
    }

    #[tokio::test]
    async fn test_async_binding() {
        let f = asynchronous(|name: String| async move { format!("hello {name}") });
        assert_eq!(f(vec![json!("page")]).await, Ok(json!("hello page")));
    }

    #[tokio::test]
    async fn test_eight_arguments() {
        let f = sync(|a: u8, b: u8, c: u8, d: u8, e: u8, g: u8, h: u8, i: u8| {
            u32::from(a) + u32::from(b) + u32::from(c) + u32::from(d)
                + u32::from(e) + u32::from(g) + u32::from(h) + u32::from(i)
        });
        let args = (1..=8).map(|n| json!(n)).collect();
        assert_eq!(f(args).await, Ok(json!(36)));
    }

    #[tokio::test]
    async fn test_binding_fn_sees_raw_args() {
        let f = binding_fn(|args: Vec<Value>| async move { Ok(json!(args.len())) });
        assert_eq!(f(vec![json!(1), json!("x"), Value::Null]).await, Ok(json!(3)));
    }

    #[test]
    fn test_from_panic_messages() {
        let err = BindingError::from_panic(Box::new("static message"));
        assert_eq!(err.message(), "binding panicked: static message");

        let err = BindingError::from_panic(Box::new(String::from("owned")));
        assert_eq!(err.message(), "binding panicked: owned");

        let err = BindingError::from_panic(Box::new(42_u8));
        assert_eq!(err.message(), "binding panicked: unknown panic");
    }
}
