mod otp;
