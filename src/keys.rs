//! Logical engine keys emitted by the controller bindings.
//!
//! Names match the engine's gamepad/motion-controller key identifiers. The
//! `u32` code is the declaration index and is what crosses the C ABI.

macro_rules! controller_keys {
    ($($variant:ident => $name:literal,)*) => {
        #[repr(u32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ControllerKey {
            $($variant,)*
        }

        impl ControllerKey {
            /// Every key, in code order.
            pub const ALL: &'static [ControllerKey] = &[$(ControllerKey::$variant,)*];

            /// Engine identifier of this key.
            pub fn name(self) -> &'static str {
                match self {
                    $(ControllerKey::$variant => $name,)*
                }
            }
        }
    };
}

controller_keys! {
    // Left motion controller
    SpecialLeft => "Special_Left",
    LeftShoulder => "MotionController_Left_Shoulder",
    LeftThumbstick => "MotionController_Left_Thumbstick",
    LeftFaceButton1 => "MotionController_Left_FaceButton1",
    LeftFaceButton2 => "MotionController_Left_FaceButton2",
    LeftFaceButton3 => "MotionController_Left_FaceButton3",
    LeftFaceButton4 => "MotionController_Left_FaceButton4",
    LeftThumbstickX => "MotionController_Left_Thumbstick_X",
    LeftThumbstickRight => "MotionController_Left_Thumbstick_Right",
    LeftThumbstickLeft => "MotionController_Left_Thumbstick_Left",
    LeftThumbstickY => "MotionController_Left_Thumbstick_Y",
    LeftThumbstickUp => "MotionController_Left_Thumbstick_Up",
    LeftThumbstickDown => "MotionController_Left_Thumbstick_Down",
    LeftTriggerAxis => "MotionController_Left_TriggerAxis",
    LeftTrigger => "MotionController_Left_Trigger",

    // Right motion controller
    SpecialRight => "Special_Right",
    RightShoulder => "MotionController_Right_Shoulder",
    RightThumbstick => "MotionController_Right_Thumbstick",
    RightFaceButton1 => "MotionController_Right_FaceButton1",
    RightFaceButton2 => "MotionController_Right_FaceButton2",
    RightFaceButton3 => "MotionController_Right_FaceButton3",
    RightFaceButton4 => "MotionController_Right_FaceButton4",
    RightThumbstickX => "MotionController_Right_Thumbstick_X",
    RightThumbstickRight => "MotionController_Right_Thumbstick_Right",
    RightThumbstickLeft => "MotionController_Right_Thumbstick_Left",
    RightThumbstickY => "MotionController_Right_Thumbstick_Y",
    RightThumbstickUp => "MotionController_Right_Thumbstick_Up",
    RightThumbstickDown => "MotionController_Right_Thumbstick_Down",
    RightTriggerAxis => "MotionController_Right_TriggerAxis",
    RightTrigger => "MotionController_Right_Trigger",

    // Gamepad-style aliases
    GamepadRightShoulder => "Gamepad_RightShoulder",
    GamepadRightThumb => "Gamepad_RightThumbstick",
    GamepadFaceButtonBottom => "Gamepad_FaceButton_Bottom",
    GamepadFaceButtonRight => "Gamepad_FaceButton_Right",
    GamepadFaceButtonLeft => "Gamepad_FaceButton_Left",
    GamepadFaceButtonTop => "Gamepad_FaceButton_Top",
    GamepadLeftShoulder => "Gamepad_LeftShoulder",
    GamepadLeftThumb => "Gamepad_LeftThumbstick",
    GamepadDPadDown => "Gamepad_DPad_Down",
    GamepadDPadRight => "Gamepad_DPad_Right",
    GamepadDPadLeft => "Gamepad_DPad_Left",
    GamepadDPadUp => "Gamepad_DPad_Up",
    GamepadLeftX => "Gamepad_LeftX",
    GamepadLeftStickRight => "Gamepad_LeftStick_Right",
    GamepadLeftStickLeft => "Gamepad_LeftStick_Left",
    GamepadLeftY => "Gamepad_LeftY",
    GamepadLeftStickUp => "Gamepad_LeftStick_Up",
    GamepadLeftStickDown => "Gamepad_LeftStick_Down",
    GamepadRightX => "Gamepad_RightX",
    GamepadRightStickRight => "Gamepad_RightStick_Right",
    GamepadRightStickLeft => "Gamepad_RightStick_Left",
    GamepadRightY => "Gamepad_RightY",
    GamepadRightStickUp => "Gamepad_RightStick_Up",
    GamepadRightStickDown => "Gamepad_RightStick_Down",
    GamepadLeftTriggerAxis => "Gamepad_LeftTriggerAxis",
    GamepadRightTriggerAxis => "Gamepad_RightTriggerAxis",
    GamepadLeftTrigger => "Gamepad_LeftTrigger",
    GamepadRightTrigger => "Gamepad_RightTrigger",
}

impl ControllerKey {
    /// Stable numeric code used by the C ABI.
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<ControllerKey> {
        Self::ALL.get(code as usize).copied()
    }
}

impl std::fmt::Display for ControllerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
