use crate::{
    request::{FromRequest, FromRequestParts},
    response::{error_response, Responder, Response},
};
use hyper::{Body, Request};
use std::marker::PhantomData;

/// Trait implemented by a handler's transition state. Introduced to have
/// handlers that are generic only over the request type.
pub trait Service<R> {
    type Response;

    /// Calls service's logic.
    fn call(&self, req: R) -> Self::Response;
}

/// Transition state for a handler; it 'hides' the Q type that is specific
/// to the various function shapes (different numbers of parameters).
///
/// IntoService implements Service and this way it is responsible for
/// running the wanted handler's logic.
pub struct IntoService<H, Q, B> {
    handler: H,
    _marker: PhantomData<fn() -> (Q, B)>,
}

impl<H, Q, B> Service<Request<B>> for IntoService<H, Q, B>
where
    H: HandlerTrait<Q, B>,
{
    type Response = Response;

    fn call(&self, req: Request<B>) -> Self::Response {
        self.handler.handle(req)
    }
}

/// Main entrypoint for crate handlers. Functions of zero to five
/// parameters implement this trait: every leading parameter is created
/// from the request head, the final one may consume the whole request.
/// `into_service` turns Self into the `IntoService` that routes store.
pub trait HandlerTrait<Q, B = Body>: Sized + Send + Sync + 'static {
    /// Extracts declared parameters and runs the user's logic. An
    /// extraction failure answers for the request without reaching the
    /// handler body.
    fn handle(&self, request: Request<B>) -> Response;

    /// Turns Self into `IntoService`.
    fn into_service(self) -> IntoService<Self, Q, B> {
        IntoService {
            handler: self,
            _marker: PhantomData,
        }
    }
}

impl<F, B, R> HandlerTrait<((),), B> for F
where
    R: Responder + 'static,
    F: Fn() -> R + Send + Sync + 'static,
{
    fn handle(&self, _request: Request<B>) -> Response {
        match self().into_response() {
            Ok(response) => response,
            Err(e) => error_response(e),
        }
    }
}

macro_rules! implement_handler_trait {
    ([$($ty:ident),*], $last:ident) => {
        #[allow(non_snake_case, unused_mut)]
        impl<F, B, R, M, $($ty,)* $last> HandlerTrait<($($ty,)* $last, M), B> for F
        where
            R: Responder + 'static,
            $($ty: FromRequestParts,)*
            $last: FromRequest<B, M>,
            F: Fn($($ty,)* $last) -> R + Send + Sync + 'static,
        {
            fn handle(&self, request: Request<B>) -> Response {
                let (mut parts, body) = request.into_parts();

                $(
                    let $ty = match $ty::from_request_parts(&mut parts) {
                        Ok(value) => value,
                        Err(e) => return error_response(e),
                    };
                )*
                let $last = match $last::from_request(Request::from_parts(parts, body)) {
                    Ok(value) => value,
                    Err(e) => return error_response(e),
                };

                match self($($ty,)* $last).into_response() {
                    Ok(response) => response,
                    Err(e) => error_response(e),
                }
            }
        }
    };
}

implement_handler_trait!([], T1);
implement_handler_trait!([T1], T2);
implement_handler_trait!([T1, T2], T3);
implement_handler_trait!([T1, T2, T3], T4);
implement_handler_trait!([T1, T2, T3, T4], T5);

/// Type-erased service, the form routes keep handlers in.
pub struct BoxedService<T, U>(pub Box<dyn Service<T, Response = U> + Send + Sync>);

impl<T, U> BoxedService<T, U> {
    pub fn new<S>(service: S) -> Self
    where
        S: Service<T, Response = U> + Send + Sync + 'static,
    {
        Self(Box::new(service))
    }
}

impl<H, Q, B> From<IntoService<H, Q, B>> for BoxedService<Request<B>, Response>
where
    B: 'static,
    Q: 'static,
    H: HandlerTrait<Q, B>,
{
    fn from(val: IntoService<H, Q, B>) -> Self {
        BoxedService::new(val)
    }
}
