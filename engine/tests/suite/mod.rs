mod exclusive;
mod gate;
mod idempotence;
