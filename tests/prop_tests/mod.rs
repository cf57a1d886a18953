mod expiry_props;
mod key_props;
