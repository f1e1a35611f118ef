pub mod new_subscriber;
pub mod subscriber;
pub mod subscriber_email;
pub mod subscription_redirect;
pub mod verification_token;
