use std::fmt;

use crate::core::{
    joinpoint::{Failure, Value},
    signature::Signature,
};

/// Target defines the port (interface) for invoking the real implementation
/// behind a stand-in.
///
/// Implementations dispatch on `operation.method_name` (and parameter types
/// when overloaded). A target that calls one of its own operations from
/// inside `invoke` does so directly, so that nested call never passes
/// through any advice.
pub trait Target: Send + Sync + fmt::Debug + 'static {
    /// Runtime type of the receiver, as registered in the type registry.
    fn type_name(&self) -> &str;

    /// Run the real operation.
    ///
    /// # Arguments
    /// * `operation` - The signature being invoked, as resolved on the stand-in
    /// * `args` - Runtime argument values, already checked for arity
    fn invoke(&self, operation: &Signature, args: &[Value]) -> Result<Value, Failure>;
}
