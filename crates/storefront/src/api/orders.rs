//! Order and payment endpoints.

use reqwest::Method;
use tracing::instrument;

use shuttle_house_core::OrderId;
use shuttle_house_core::checkout::Gateway;

use super::types::{CreateOrder, CreatePayment, Order, PaymentLink};
use super::{AccessToken, ApiClient, ApiError};

impl ApiClient {
    /// Create an order from the customer's current cart.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] if the backend refuses the order
    /// (empty cart, stock changed, coupon no longer valid).
    #[instrument(skip(self, token, order), fields(method = order.payment_method.as_str()))]
    pub async fn create_order(
        &self,
        token: &AccessToken,
        order: &CreateOrder,
    ) -> Result<Order, ApiError> {
        let builder = self
            .request(Method::POST, "/api/orders", Some(token))
            .json(order);
        self.send(builder).await
    }

    /// The customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn my_orders(&self, token: &AccessToken) -> Result<Vec<Order>, ApiError> {
        self.send(self.request(Method::GET, "/api/orders/my", Some(token)))
            .await
    }

    /// One of the customer's orders.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the order does not exist or belongs to
    /// someone else.
    #[instrument(skip(self, token))]
    pub async fn get_order(&self, token: &AccessToken, id: OrderId) -> Result<Order, ApiError> {
        let path = format!("/api/orders/{id}");
        self.send(self.request(Method::GET, &path, Some(token)))
            .await
    }

    /// Cancel a pending order.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] once the order has left the pending state.
    #[instrument(skip(self, token))]
    pub async fn cancel_order(&self, token: &AccessToken, id: OrderId) -> Result<(), ApiError> {
        let path = format!("/api/orders/{id}/cancel");
        self.send_unit(self.request(Method::PUT, &path, Some(token)))
            .await
    }

    /// Public order lookup by order code and the phone number it ships to.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when the pair does not match an order.
    #[instrument(skip(self, phone))]
    pub async fn track_order(&self, code: &str, phone: &str) -> Result<Order, ApiError> {
        let builder = self
            .request(Method::GET, "/api/orders/track", None)
            .query(&[("code", code), ("phone", phone)]);
        self.send(builder).await
    }

    /// Ask the backend for a hosted payment page for an existing order.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway could not be reached or refused the order.
    #[instrument(skip(self, token, payment), fields(order_id = %payment.order_id))]
    pub async fn create_payment(
        &self,
        token: &AccessToken,
        gateway: Gateway,
        payment: &CreatePayment,
    ) -> Result<PaymentLink, ApiError> {
        let path = format!("/api/payments/{}/create", gateway.provider());
        let builder = self.request(Method::POST, &path, Some(token)).json(payment);
        self.send(builder).await
    }
}
