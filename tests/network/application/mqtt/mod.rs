mod codec;
mod live_broker;
