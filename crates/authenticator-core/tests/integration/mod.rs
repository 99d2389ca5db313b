mod otp_roundtrip;
