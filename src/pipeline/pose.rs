//! Keypoint model shared by every backend, plus the overlay geometry drawn
//! onto each frame.

/// COCO 17-keypoint layout produced by MoveNet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;
}

/// Bone list (start keypoint, end keypoint).
pub const SKELETON_CONNECTIONS: [(KeypointIndex, KeypointIndex); 16] = [
    // face
    (KeypointIndex::LeftEar, KeypointIndex::LeftEye),
    (KeypointIndex::LeftEye, KeypointIndex::Nose),
    (KeypointIndex::Nose, KeypointIndex::RightEye),
    (KeypointIndex::RightEye, KeypointIndex::RightEar),
    // arms
    (KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder),
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftElbow),
    (KeypointIndex::LeftElbow, KeypointIndex::LeftWrist),
    (KeypointIndex::RightShoulder, KeypointIndex::RightElbow),
    (KeypointIndex::RightElbow, KeypointIndex::RightWrist),
    // torso
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftHip),
    (KeypointIndex::RightShoulder, KeypointIndex::RightHip),
    (KeypointIndex::LeftHip, KeypointIndex::RightHip),
    // legs
    (KeypointIndex::LeftHip, KeypointIndex::LeftKnee),
    (KeypointIndex::LeftKnee, KeypointIndex::LeftAnkle),
    (KeypointIndex::RightHip, KeypointIndex::RightKnee),
    (KeypointIndex::RightKnee, KeypointIndex::RightAnkle),
];

/// Keypoints below this confidence are not drawn.
pub const CONFIDENCE_THRESHOLD: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
    /// Normalized X (0.0..=1.0)
    pub x: f32,
    /// Normalized Y (0.0..=1.0)
    pub y: f32,
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    pub fn is_valid(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }

    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        let px = (self.x * width as f32) as i32;
        let py = (self.y * height as f32) as i32;
        (px, py)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pose {
    pub keypoints: [Keypoint; KeypointIndex::COUNT],
}

impl Pose {
    pub fn new(keypoints: [Keypoint; KeypointIndex::COUNT]) -> Self {
        Self { keypoints }
    }

    pub fn get(&self, index: KeypointIndex) -> &Keypoint {
        &self.keypoints[index as usize]
    }
}

/// Pixel-space primitives to draw for one pose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    pub points: Vec<(i32, i32)>,
    pub segments: Vec<((i32, i32), (i32, i32))>,
}

impl Overlay {
    /// Project `pose` onto a `width`x`height` frame, keeping only keypoints at
    /// or above `threshold` and bones whose two ends both pass.
    pub fn from_pose(pose: &Pose, width: u32, height: u32, threshold: f32) -> Self {
        let points = pose
            .keypoints
            .iter()
            .filter(|kp| kp.is_valid(threshold))
            .map(|kp| kp.to_pixel(width, height))
            .collect();

        let segments = SKELETON_CONNECTIONS
            .iter()
            .filter_map(|&(a, b)| {
                let (ka, kb) = (pose.get(a), pose.get(b));
                (ka.is_valid(threshold) && kb.is_valid(threshold))
                    .then(|| (ka.to_pixel(width, height), kb.to_pixel(width, height)))
            })
            .collect();

        Self { points, segments }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypoint_to_pixel() {
        let kp = Keypoint::new(0.5, 0.25, 1.0);
        assert_eq!(kp.to_pixel(640, 480), (320, 120));
    }

    #[test]
    fn overlay_skips_low_confidence_keypoints_and_their_bones() {
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        keypoints[KeypointIndex::LeftHip as usize] = Keypoint::new(0.25, 0.5, 0.9);
        keypoints[KeypointIndex::LeftKnee as usize] = Keypoint::new(0.25, 0.75, 0.8);
        keypoints[KeypointIndex::LeftAnkle as usize] = Keypoint::new(0.25, 1.0, 0.1);

        let overlay = Overlay::from_pose(&Pose::new(keypoints), 100, 100, CONFIDENCE_THRESHOLD);

        assert_eq!(overlay.points, vec![(25, 50), (25, 75)]);
        assert_eq!(overlay.segments, vec![((25, 50), (25, 75))]);
    }

    #[test]
    fn empty_pose_draws_nothing() {
        let overlay = Overlay::from_pose(&Pose::default(), 640, 480, CONFIDENCE_THRESHOLD);
        assert!(overlay.points.is_empty());
        assert!(overlay.segments.is_empty());
    }
}
