//! Typed call surface mirroring a server route tree.
//!
//! [`client_tree!`](crate::client_tree) declares the tree shape once and
//! generates accessor methods whose chain mirrors the server keys:
//!
//! ```ignore
//! rpc_tree::client_tree! {
//!     pub struct Api {
//!         auth {
//!             login: query(LoginInput) -> LoginOutput,
//!             token: mutate(TokenInput) -> TokenOutput | ApiError,
//!         },
//!     }
//! }
//!
//! let api = Api::new(&Client::new("http://localhost:3000")?);
//! let result = api.auth().login().query(&input, CallOptions::new()).await?;
//! ```
//!
//! Each internal node becomes a module named after its key holding a
//! `Node` struct, so entries are referenced through `use super::*` and a
//! user type called `Node` is shadowed inside nested groups.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::{CallOptions, CallResult, CallTarget, ClientError};
use crate::rpc::ApiError;

/// Leaf bound to a `query` route.
#[derive(Debug, Clone)]
pub struct Query<I, O, E = ApiError> {
    target: CallTarget,
    _marker: PhantomData<fn(&I) -> (O, E)>,
}

impl<I, O, E> Query<I, O, E>
where
    I: Serialize,
    O: DeserializeOwned,
    E: DeserializeOwned,
{
    pub fn new(target: CallTarget) -> Self {
        Self {
            target,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &str {
        self.target.path()
    }

    pub async fn query(
        &self,
        input: &I,
        options: CallOptions,
    ) -> Result<CallResult<O, E>, ClientError> {
        self.target.query(input, options).await
    }
}

/// Leaf bound to a `mutation` route.
#[derive(Debug, Clone)]
pub struct Mutate<I, O, E = ApiError> {
    target: CallTarget,
    _marker: PhantomData<fn(&I) -> (O, E)>,
}

impl<I, O, E> Mutate<I, O, E>
where
    I: Serialize,
    O: DeserializeOwned,
    E: DeserializeOwned,
{
    pub fn new(target: CallTarget) -> Self {
        Self {
            target,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &str {
        self.target.path()
    }

    pub async fn mutate(
        &self,
        input: &I,
        options: CallOptions,
    ) -> Result<CallResult<O, E>, ClientError> {
        self.target.mutate(input, options).await
    }
}

/// Declare a typed client whose accessors mirror a server route tree.
///
/// Entries are `key: query(Input) -> Output`, `key: mutate(Input) -> Output`
/// (optionally `| Error`, default `ApiError`), or `key { ... }` for a nested
/// group, separated by commas.
#[macro_export]
macro_rules! client_tree {
    ($(#[$meta:meta])* $vis:vis struct $name:ident { $($body:tt)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            target: $crate::client::CallTarget,
        }

        impl $name {
            pub fn new(client: &$crate::client::Client) -> Self {
                Self { target: client.root() }
            }
        }

        $crate::__client_tree_entries!($name; $($body)*);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __client_tree_entries {
    ($owner:ident;) => {};

    ($owner:ident; $key:ident : query($input:ty) -> $output:ty $(| $error:ty)? $(, $($rest:tt)*)?) => {
        impl $owner {
            pub fn $key(&self) -> $crate::client::Query<$input, $output $(, $error)?> {
                $crate::client::Query::new(self.target.at(stringify!($key)))
            }
        }
        $crate::__client_tree_entries!($owner; $($($rest)*)?);
    };

    ($owner:ident; $key:ident : mutate($input:ty) -> $output:ty $(| $error:ty)? $(, $($rest:tt)*)?) => {
        impl $owner {
            pub fn $key(&self) -> $crate::client::Mutate<$input, $output $(, $error)?> {
                $crate::client::Mutate::new(self.target.at(stringify!($key)))
            }
        }
        $crate::__client_tree_entries!($owner; $($($rest)*)?);
    };

    ($owner:ident; $key:ident { $($inner:tt)* } $(, $($rest:tt)*)?) => {
        pub mod $key {
            #[allow(unused_imports)]
            use super::*;

            #[derive(Debug, Clone)]
            pub struct Node {
                pub(super) target: $crate::client::CallTarget,
            }

            $crate::__client_tree_entries!(Node; $($inner)*);
        }

        impl $owner {
            pub fn $key(&self) -> $key::Node {
                $key::Node { target: self.target.at(stringify!($key)) }
            }
        }
        $crate::__client_tree_entries!($owner; $($($rest)*)?);
    };
}
