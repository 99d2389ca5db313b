mod secret_masking;
mod timing_sidechannel;
